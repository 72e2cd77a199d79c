use phillip_build::BuildError;
use phillip_codegen::CodegenError;
use phillip_config::ConfigError;
use phillip_ffi::FfiError;
use phillip_templates::TemplateError;
use phillip_types::TypeError;

/// Every failure a build session can surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Ffi(#[from] FfiError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("failed to create a build directory: {0}")]
    TempDir(#[source] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
