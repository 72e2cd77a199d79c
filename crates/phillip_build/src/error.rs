use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The toolchain rejected the sources, could not be spawned, or timed out.
    #[error(
        "compilation of `{module}` failed ({status})\ncommand: {command}\n--- toolchain output ---\n{diagnostics}\n--- sources ---\n{listing}"
    )]
    Compile {
        module: String,
        command: String,
        status: String,
        diagnostics: String,
        listing: String,
    },

    #[error("failed to load {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Raw toolchain output for compile failures.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Compile { diagnostics, .. } => Some(diagnostics),
            Self::Load { .. } | Self::Io { .. } => None,
        }
    }
}
