use phillip_build::toolchain::run_process;
use phillip_build::{BuildError, BuildOrchestrator, ExtensionArgs, SourceSet};
use phillip_config::BuildConfig;
use phillip_templates::{ProbeContext, Templates};
use phillip_utils::Stopwatch;
use tracing::{debug, info};

use crate::descriptor::{NumericKind, Signage, TypeDescriptor, TypeInfo, TypeSystem};
use crate::error::TypeError;

const PROBE_MODULE: &str = "phillip_probe";
const PROBE_SOURCE: &str = "probe.cpp";

/// One record of probe output: `[system, name, signage, kind, size]`.
type ProbeRecord = (TypeSystem, String, Signage, NumericKind, usize);

/// Discovers native type metadata by compiling and running a probe program.
pub struct NativeProbe<'a> {
    config: &'a BuildConfig,
    templates: &'a Templates,
    headers: &'a [String],
}

impl<'a> NativeProbe<'a> {
    pub fn new(config: &'a BuildConfig, templates: &'a Templates, headers: &'a [String]) -> Self {
        Self {
            config,
            templates,
            headers,
        }
    }

    /// Render the probe program for `names` without building it.
    pub fn program(&self, names: &[String]) -> Result<String, TypeError> {
        let headers = self
            .headers
            .iter()
            .map(|header| phillip_templates::include_target(header))
            .collect::<Vec<_>>();
        Ok(self.templates.render_probe(&ProbeContext {
            headers: &headers,
            types: names,
        })?)
    }

    /// Probe `names` in one program; results come back in request order.
    pub fn probe(&self, names: &[String]) -> Result<Vec<(TypeDescriptor, TypeInfo)>, TypeError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let program = self.program(names)?;
        let stopwatch = Stopwatch::start_new();

        let workdir = tempfile::Builder::new()
            .prefix("phillip-probe-")
            .disable_cleanup(self.config.keep_temporaries)
            .tempdir()
            .map_err(|err| TypeError::ProbeExecution {
                message: format!("failed to create probe directory: {err}"),
                program: program.clone(),
            })?;

        let mut sources = SourceSet::new(PROBE_MODULE, workdir.path());
        sources.write_source(PROBE_SOURCE, &program)?;

        let orchestrator = BuildOrchestrator::new(self.config.clone());
        let artifact = match orchestrator.compile_executable(&sources, &ExtensionArgs::default()) {
            Ok(artifact) => artifact,
            Err(BuildError::Compile { diagnostics, .. }) => {
                return Err(TypeError::ProbeCompilation {
                    diagnostics,
                    program,
                });
            }
            Err(other) => return Err(other.into()),
        };

        let output = run_process(
            artifact.path.as_os_str(),
            &[],
            workdir.path(),
            self.config.compile_timeout(),
        )
        .map_err(|err| TypeError::ProbeExecution {
            message: format!("failed to run {}: {err}", artifact.path.display()),
            program: program.clone(),
        })?;

        if !output.success {
            return Err(TypeError::ProbeExecution {
                message: format!("probe exited with {}: {}", output.status, output.stderr),
                program,
            });
        }

        let results = parse_probe_output(&output.stdout, names).map_err(|message| {
            TypeError::ProbeExecution {
                message,
                program: program.clone(),
            }
        })?;

        if self.config.keep_temporaries {
            info!(dir = %workdir.path().display(), "kept probe directory");
        }
        debug!(
            types = names.len(),
            elapsed_ms = stopwatch.elapsed_ms(),
            "probed native types"
        );
        Ok(results)
    }
}

/// Parse the probe's stdout. Anything beyond the single JSON array is an error.
pub fn parse_probe_output(
    stdout: &str,
    expected: &[String],
) -> Result<Vec<(TypeDescriptor, TypeInfo)>, String> {
    let records: Vec<ProbeRecord> =
        serde_json::from_str(stdout).map_err(|err| format!("unparseable probe output: {err}"))?;

    if records.len() != expected.len() {
        return Err(format!(
            "probe reported {} types, expected {}",
            records.len(),
            expected.len()
        ));
    }

    records
        .into_iter()
        .zip(expected)
        .map(|((system, name, signage, numeric_kind, size), requested)| {
            if system != TypeSystem::Native || name != *requested {
                return Err(format!(
                    "probe reported {system}:{name} where native:{requested} was expected"
                ));
            }
            Ok((
                TypeDescriptor::native(&name),
                TypeInfo::new(signage, numeric_kind, size),
            ))
        })
        .collect()
}
