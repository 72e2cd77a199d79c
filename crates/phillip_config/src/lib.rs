//! Toolchain configuration shared by every build session
//!
//! Configuration is resolved from defaults, an optional TOML file and
//! `PHILLIP_*` environment variables, in that order of increasing precedence.

pub mod target;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use crate::target::TargetTriple;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("TOML support not enabled. Enable the 'toml-config' feature.")]
    TomlDisabled,
}

/// Optimization level handed to the native compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptLevel {
    None,
    Default,
    Aggressive,
}

impl OptLevel {
    pub fn flag(self) -> &'static str {
        match self {
            Self::None => "-O0",
            Self::Default => "-O2",
            Self::Aggressive => "-O3",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "0" | "none" => Some(Self::None),
            "2" | "default" => Some(Self::Default),
            "3" | "aggressive" => Some(Self::Aggressive),
            _ => None,
        }
    }
}

/// How generated sources are turned into native artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Compiler driver; `None` selects the target default (`c++`, `clang++` on Windows)
    pub compiler: Option<String>,

    /// Language standard passed as `-std=`
    pub cxx_standard: String,

    pub opt_level: OptLevel,

    /// Extra flags appended to every compile
    pub extra_compile_args: Vec<String>,

    /// Extra flags appended to every link
    pub extra_link_args: Vec<String>,

    /// Keep probe programs and generated sources on disk after the session
    pub keep_temporaries: bool,

    /// Upper bound for a single toolchain invocation, in seconds
    pub compile_timeout_secs: Option<u64>,

    #[serde(skip)]
    pub target: TargetTriple,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            compiler: None,
            cxx_standard: "c++17".to_string(),
            opt_level: OptLevel::Default,
            extra_compile_args: Vec::new(),
            extra_link_args: Vec::new(),
            keep_temporaries: false,
            compile_timeout_secs: None,
            target: TargetTriple::host(),
        }
    }
}

impl BuildConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().merge_with_env()
    }

    /// Load configuration from TOML file
    #[cfg(feature = "toml-config")]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }

    /// Load configuration from TOML file (stub when toml feature is disabled)
    #[cfg(not(feature = "toml-config"))]
    pub fn from_file(_path: &Path) -> Result<Self, ConfigError> {
        Err(ConfigError::TomlDisabled)
    }

    /// Merge with environment variables (env vars take precedence)
    pub fn merge_with_env(mut self) -> Self {
        if let Some(compiler) = env_string("PHILLIP_CXX").or_else(|| env_string("CXX")) {
            self.compiler = Some(compiler);
        }

        if let Some(flags) = env_string("PHILLIP_CXXFLAGS") {
            self.extra_compile_args
                .extend(flags.split_whitespace().map(str::to_string));
        }

        if let Some(flags) = env_string("PHILLIP_LDFLAGS") {
            self.extra_link_args
                .extend(flags.split_whitespace().map(str::to_string));
        }

        if let Some(level) = env_string("PHILLIP_OPT_LEVEL").and_then(|v| OptLevel::parse(&v)) {
            self.opt_level = level;
        }

        if let Some(val) = env_string("PHILLIP_KEEP_TEMPS") {
            self.keep_temporaries = val.parse().unwrap_or(true);
        }

        if let Some(val) = env_string("PHILLIP_COMPILE_TIMEOUT_SECS") {
            self.compile_timeout_secs = val.parse().ok();
        }

        self
    }

    /// Compiler driver after applying the target default
    pub fn compiler(&self) -> String {
        self.compiler
            .clone()
            .unwrap_or_else(|| self.target.cxx_compiler())
    }

    pub fn compile_timeout(&self) -> Option<Duration> {
        self.compile_timeout_secs.map(Duration::from_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
