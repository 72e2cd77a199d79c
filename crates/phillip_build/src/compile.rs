use std::fs;
use std::path::{Path, PathBuf};

use phillip_config::BuildConfig;
use phillip_utils::Stopwatch;
use tracing::{info, warn};

use crate::error::BuildError;
use crate::library::LoadedLibrary;
use crate::source::SourceSet;
use crate::toolchain::Toolchain;

/// Per-build knobs, in the same shape as a build-extension record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionArgs {
    pub export_symbols: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub define_macros: Vec<(String, Option<String>)>,
    pub extra_compile_args: Vec<String>,
    pub extra_link_args: Vec<String>,
}

pub fn generate_extension_args<I, S>(export_symbols: I) -> ExtensionArgs
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ExtensionArgs {
        export_symbols: export_symbols.into_iter().map(Into::into).collect(),
        ..ExtensionArgs::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    SharedLibrary,
    Executable,
}

/// A successfully linked artifact, not yet loaded.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub module_name: String,
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub exports: Vec<String>,
}

pub struct BuildOrchestrator {
    config: BuildConfig,
    toolchain: Toolchain,
}

impl BuildOrchestrator {
    pub fn new(config: BuildConfig) -> Self {
        let toolchain = Toolchain::from_config(&config);
        Self { config, toolchain }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Compile `sources` into a shared library inside the set's target directory.
    pub fn compile(
        &self,
        sources: &SourceSet,
        args: &ExtensionArgs,
    ) -> Result<CompiledArtifact, BuildError> {
        let target = &self.config.target;
        let output = sources
            .target_dir()
            .join(target.shared_library_name(sources.artifact_stem()));

        let mut flags = target.shared_library_flags();
        for symbol in &args.export_symbols {
            flags.extend(target.export_flags(symbol));
        }

        self.run(sources, args, &output, &flags, ArtifactKind::SharedLibrary)
    }

    /// Compile `sources` into a standalone executable (used for probe programs).
    pub fn compile_executable(
        &self,
        sources: &SourceSet,
        args: &ExtensionArgs,
    ) -> Result<CompiledArtifact, BuildError> {
        let mut output = sources.target_dir().join(sources.artifact_stem());
        let extension = self.config.target.executable_extension();
        if !extension.is_empty() {
            output.set_extension(extension);
        }

        self.run(sources, args, &output, &[], ArtifactKind::Executable)
    }

    pub fn load(&self, artifact: &CompiledArtifact) -> Result<LoadedLibrary, BuildError> {
        if artifact.kind != ArtifactKind::SharedLibrary {
            return Err(BuildError::Load {
                path: artifact.path.clone(),
                message: "artifact is an executable, not a loadable library".to_string(),
            });
        }
        LoadedLibrary::open(&artifact.path, artifact.exports.clone())
    }

    /// Load a library that was built elsewhere.
    pub fn load_path(&self, path: &Path) -> Result<LoadedLibrary, BuildError> {
        LoadedLibrary::open(path, Vec::new())
    }

    fn run(
        &self,
        sources: &SourceSet,
        args: &ExtensionArgs,
        output: &Path,
        kind_flags: &[String],
        kind: ArtifactKind,
    ) -> Result<CompiledArtifact, BuildError> {
        let target_dir = sources.target_dir();
        fs::create_dir_all(target_dir).map_err(|err| BuildError::io(target_dir, err))?;

        if output.exists() {
            fs::remove_file(output).map_err(|err| BuildError::io(output, err))?;
        }

        let command_args = self.command_args(sources, args, output, kind_flags);
        let stopwatch = Stopwatch::start_new();

        let result = self
            .toolchain
            .invoke(&command_args, target_dir)
            .map_err(|err| BuildError::Compile {
                module: sources.module_name().to_string(),
                command: format!("{} {}", self.toolchain.driver(), command_args.join(" ")),
                status: "not started".to_string(),
                diagnostics: format!("failed to spawn `{}`: {err}", self.toolchain.driver()),
                listing: sources.listing().to_string(),
            })?;

        if !result.success || !output.exists() {
            warn!(
                module = sources.module_name(),
                status = %result.status,
                "toolchain rejected generated sources"
            );
            return Err(BuildError::Compile {
                module: sources.module_name().to_string(),
                command: result.command.clone(),
                status: result.status.clone(),
                diagnostics: result.diagnostics(),
                listing: sources.listing().to_string(),
            });
        }

        info!(
            module = sources.module_name(),
            artifact = %output.display(),
            elapsed_ms = stopwatch.elapsed_ms(),
            "compiled"
        );

        Ok(CompiledArtifact {
            module_name: sources.module_name().to_string(),
            path: output.to_path_buf(),
            kind,
            exports: args.export_symbols.clone(),
        })
    }

    fn command_args(
        &self,
        sources: &SourceSet,
        args: &ExtensionArgs,
        output: &Path,
        kind_flags: &[String],
    ) -> Vec<String> {
        let mut cmd = vec![
            format!("-std={}", self.config.cxx_standard),
            self.config.opt_level.flag().to_string(),
        ];
        cmd.extend(kind_flags.iter().cloned());

        for (name, value) in &args.define_macros {
            match value {
                Some(value) => cmd.push(format!("-D{name}={value}")),
                None => cmd.push(format!("-D{name}")),
            }
        }
        for dir in &args.include_dirs {
            cmd.push(format!("-I{}", dir.display()));
        }

        cmd.extend(args.extra_compile_args.iter().cloned());
        cmd.extend(self.config.extra_compile_args.iter().cloned());

        // Inputs before libraries so the linker resolves against them in order
        cmd.extend(sources.sources().iter().map(|p| p.display().to_string()));
        cmd.push("-o".to_string());
        cmd.push(output.display().to_string());

        for dir in &args.library_dirs {
            cmd.push(format!("-L{}", dir.display()));
        }
        for lib in &args.libraries {
            cmd.push(format!("-l{lib}"));
        }

        cmd.extend(args.extra_link_args.iter().cloned());
        cmd.extend(self.config.extra_link_args.iter().cloned());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phillip_config::TargetTriple;

    fn linux_orchestrator() -> BuildOrchestrator {
        BuildOrchestrator::new(BuildConfig {
            compiler: Some("c++".to_string()),
            target: TargetTriple::parse("x86_64-unknown-linux-gnu").unwrap(),
            ..BuildConfig::default()
        })
    }

    #[test]
    fn test_command_orders_inputs_before_libraries() {
        let orchestrator = linux_orchestrator();
        let sources = SourceSet::new("demo", "/tmp/demo").with_source("/tmp/demo/main.cpp");
        let args = ExtensionArgs {
            libraries: vec!["m".to_string()],
            define_macros: vec![("NDEBUG".to_string(), None), ("LEVEL".to_string(), Some("2".to_string()))],
            ..generate_extension_args(["entry"])
        };

        let cmd = orchestrator.command_args(
            &sources,
            &args,
            Path::new("/tmp/demo/libdemo.so"),
            &["-shared".to_string()],
        );

        let position = |needle: &str| cmd.iter().position(|arg| arg == needle).unwrap();
        assert_eq!(cmd[0], "-std=c++17");
        assert!(position("-DNDEBUG") < position("/tmp/demo/main.cpp"));
        assert!(position("-DLEVEL=2") < position("/tmp/demo/main.cpp"));
        assert!(position("/tmp/demo/main.cpp") < position("-lm"));
        assert_eq!(cmd[position("-o") + 1], "/tmp/demo/libdemo.so");
    }

    #[test]
    fn test_missing_compiler_reports_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = BuildOrchestrator::new(BuildConfig {
            compiler: Some("phillip-no-such-compiler".to_string()),
            ..BuildConfig::default()
        });
        let mut sources = SourceSet::new("broken", dir.path());
        sources.write_source("main.cpp", "int main() { return 0; }\n").unwrap();

        let err = orchestrator
            .compile(&sources, &ExtensionArgs::default())
            .unwrap_err();
        match err {
            BuildError::Compile { diagnostics, listing, .. } => {
                assert!(diagnostics.contains("failed to spawn"));
                assert!(listing.contains("int main()"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
    fn live_orchestrator() -> Option<BuildOrchestrator> {
        let config = BuildConfig::from_env();
        if !Toolchain::from_config(&config).is_available() {
            eprintln!("skipping: `{}` is not available", config.compiler());
            return None;
        }
        Some(BuildOrchestrator::new(config))
    }

    #[test]
    fn test_compile_and_load_shared_library() {
        let Some(orchestrator) = live_orchestrator() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();

        let mut sources = SourceSet::new("__test__.answer", dir.path());
        sources
            .write_source("answer.cpp", "extern \"C\" int answer() { return 51; }\n")
            .unwrap();

        let artifact = orchestrator
            .compile(&sources, &generate_extension_args(["answer"]))
            .unwrap();
        assert!(artifact.path.starts_with(dir.path()));
        assert_eq!(artifact.kind, ArtifactKind::SharedLibrary);

        let library = orchestrator.load(&artifact).unwrap();
        assert!(library.has_symbol("answer"));
        assert!(!library.has_symbol("question"));
    }

    #[test]
    fn test_compile_error_carries_diagnostics_and_listing() {
        let Some(orchestrator) = live_orchestrator() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();

        let mut sources = SourceSet::new("broken", dir.path());
        sources
            .write_source("broken.cpp", "int broken( { return; }\n")
            .unwrap();

        let err = orchestrator
            .compile(&sources, &ExtensionArgs::default())
            .unwrap_err();
        let BuildError::Compile { diagnostics, listing, command, .. } = err else {
            panic!("expected a compile error, got {err}");
        };
        assert!(!diagnostics.trim().is_empty());
        assert!(listing.contains("   1 | int broken( { return; }"));
        assert!(command.contains("broken.cpp"));
    }

    #[test]
    fn test_executables_cannot_be_loaded() {
        let Some(orchestrator) = live_orchestrator() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();

        let mut sources = SourceSet::new("tool", dir.path());
        sources
            .write_source("tool.cpp", "int main() { return 0; }\n")
            .unwrap();

        let artifact = orchestrator
            .compile_executable(&sources, &ExtensionArgs::default())
            .unwrap();
        assert!(matches!(
            orchestrator.load(&artifact),
            Err(BuildError::Load { .. })
        ));
    }

    #[test]
    fn test_timeout_reports_compile_error() {
        let config = BuildConfig {
            compile_timeout_secs: Some(0),
            ..BuildConfig::default()
        };
        if !Toolchain::new(config.compiler(), None).is_available() {
            eprintln!("skipping: `{}` is not available", config.compiler());
            return;
        }
        let orchestrator = BuildOrchestrator::new(config);

        let dir = tempfile::tempdir().unwrap();
        let mut sources = SourceSet::new("slow", dir.path());
        sources
            .write_source("slow.cpp", "#include <iostream>\nint answer() { return 42; }\n")
            .unwrap();

        let err = orchestrator
            .compile(&sources, &ExtensionArgs::default())
            .unwrap_err();
        match err {
            BuildError::Compile { module, status, listing, .. } => {
                assert_eq!(module, "slow");
                assert_eq!(status, "timed out after 0s");
                assert!(listing.contains("int answer()"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
