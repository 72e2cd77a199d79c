use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use std::process::Output;
use std::thread;
use std::time::Duration;

use phillip_config::BuildConfig;
use phillip_utils::Stopwatch;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of one external process run.
#[derive(Debug, Clone)]
pub struct ToolchainOutput {
    pub command: String,
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl ToolchainOutput {
    /// stderr followed by stdout, as the toolchain printed them
    pub fn diagnostics(&self) -> String {
        let mut text = self.stderr.clone();
        if !self.stdout.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stdout);
        }
        text
    }

    fn from_output(command: String, output: &Output) -> Self {
        Self {
            command,
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// The compiler driver plus the limits applied to every invocation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    driver: String,
    timeout: Option<Duration>,
}

impl Toolchain {
    pub fn new(driver: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            driver: driver.into(),
            timeout,
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(config.compiler(), config.compile_timeout())
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    /// Whether the driver starts and answers `--version`.
    pub fn is_available(&self) -> bool {
        run_process(OsStr::new(&self.driver), &["--version".to_string()], Path::new("."), self.timeout)
            .is_ok_and(|output| output.success)
    }

    /// Run the compiler driver; `Err` only when it could not be spawned.
    pub fn invoke(&self, args: &[String], dir: &Path) -> io::Result<ToolchainOutput> {
        run_process(OsStr::new(&self.driver), args, dir, self.timeout)
    }
}

/// Run `program` in `dir`, capturing both streams; a timeout kills the
/// process and reports an unsuccessful output.
///
/// Bare program names are looked up on `PATH`.
pub fn run_process(
    program: &OsStr,
    args: &[String],
    dir: &Path,
    timeout: Option<Duration>,
) -> io::Result<ToolchainOutput> {
    let command = render_command(program, args);
    debug!(%command, "running");

    let stopwatch = Stopwatch::start_new();
    let expression = duct::cmd(
        program,
        args.iter().map(OsString::from).collect::<Vec<_>>(),
    )
    .dir(dir)
    .stdout_capture()
    .stderr_capture()
    .unchecked();

    let result = match timeout {
        None => {
            let output = expression.run()?;
            ToolchainOutput::from_output(command, &output)
        }
        Some(limit) => {
            let handle = expression.start()?;
            loop {
                if let Some(output) = handle.try_wait()? {
                    break ToolchainOutput::from_output(command, output);
                }
                if stopwatch.has_exceeded(limit) {
                    handle.kill()?;
                    break ToolchainOutput {
                        command,
                        success: false,
                        status: format!("timed out after {}s", limit.as_secs()),
                        stdout: String::new(),
                        stderr: String::new(),
                    };
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    debug!(
        command = %result.command,
        status = %result.status,
        elapsed_ms = stopwatch.elapsed_ms(),
        "finished"
    );
    Ok(result)
}

fn render_command(program: &OsStr, args: &[String]) -> String {
    let mut rendered = quote(&program.to_string_lossy());
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&quote(arg));
    }
    rendered
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("'{arg}'")
    } else {
        arg.to_string()
    }
}
