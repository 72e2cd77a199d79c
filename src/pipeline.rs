use std::path::{Path, PathBuf};

use phillip_build::{BuildOrchestrator, CompiledArtifact, ExtensionArgs, LoadedLibrary, SourceSet, UnloadOutcome};
use phillip_codegen::{BoundModule, ModuleGenerator};
use phillip_config::BuildConfig;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// A module compiled into its own scratch directory and loaded.
///
/// The directory is removed on drop unless `keep_temporaries` is set.
pub struct BuiltModule {
    library: LoadedLibrary,
    artifact: CompiledArtifact,
    source: PathBuf,
    header: PathBuf,
    dir: TempDir,
}

impl BuiltModule {
    pub fn library(&self) -> &LoadedLibrary {
        &self.library
    }

    pub fn artifact(&self) -> &CompiledArtifact {
        &self.artifact
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn header_path(&self) -> &Path {
        &self.header
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Bind the interfaces of `module`, normally the generator this was built from.
    pub fn bind(&self, module: &ModuleGenerator) -> Result<BoundModule> {
        Ok(module.generate(&self.library)?)
    }

    /// Callables bound earlier keep the library mapped, so drop them first
    /// to get [`UnloadOutcome::Released`].
    pub fn unload(self) -> UnloadOutcome {
        let Self { library, dir, .. } = self;
        let outcome = library.unload();
        debug!(dir = %dir.path().display(), ?outcome, "unloaded module");
        outcome
    }
}

/// Render `module`, compile it and load the result.
///
/// When `args` names no export symbols, every interface of the module is
/// exported.
pub fn compile_module(
    config: &BuildConfig,
    module: &ModuleGenerator,
    args: &ExtensionArgs,
) -> Result<BuiltModule> {
    let dir = tempfile::Builder::new()
        .prefix("phillip-module-")
        .disable_cleanup(config.keep_temporaries)
        .tempdir()
        .map_err(Error::TempDir)?;

    let mut sources = SourceSet::new(module.name(), dir.path());
    let stem = sources.artifact_stem().to_string();
    let header_name = module
        .header_name()
        .map_or_else(|| format!("{stem}.hpp"), str::to_string);

    let header = sources.write_file(&header_name, &module.render_header()?)?;
    let source = sources.write_source(&format!("{stem}.cpp"), &module.render_module()?)?;

    let mut args = args.clone();
    if args.export_symbols.is_empty() {
        args.export_symbols = module.interface_names();
    }
    args.include_dirs.push(dir.path().to_path_buf());

    let orchestrator = BuildOrchestrator::new(config.clone());
    let artifact = orchestrator.compile(&sources, &args)?;
    let library = orchestrator.load(&artifact)?;
    info!(module = module.name(), path = %artifact.path.display(), "module ready");

    Ok(BuiltModule {
        library,
        artifact,
        source,
        header,
        dir,
    })
}

/// [`compile_module`] followed by [`BuiltModule::bind`].
pub fn build_module(
    config: &BuildConfig,
    module: &ModuleGenerator,
    args: &ExtensionArgs,
) -> Result<(BuiltModule, BoundModule)> {
    let built = compile_module(config, module, args)?;
    let bound = built.bind(module)?;
    Ok((built, bound))
}
