use phillip_ffi::FfiError;
use phillip_templates::TemplateError;
use phillip_types::TypeError;

#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// Renaming after emission would leave already generated source stale.
    #[error("structure `{name}` was already rendered and can no longer be renamed")]
    AlreadyRendered { name: String },

    #[error("name `{name}` already belongs to a different structure")]
    NameConflict { name: String },

    #[error("`{name}` is not a valid identifier")]
    InvalidName { name: String },

    #[error("packing {value} is not one of 1, 2, 4, 8 or 16")]
    InvalidPacking { value: u32 },

    #[error("composite types need at least one field")]
    EmptyComposite,

    #[error("`{name}` is already defined in module `{module}`")]
    DuplicateDefinition { name: String, module: String },

    #[error("cannot marshal {what}")]
    UnsupportedMarshal { what: String },

    /// `exports` lists what the module does define, for the report.
    #[error("symbol `{symbol}` not found in {library} (module exports: [{}])", .exports.join(", "))]
    SymbolNotFound {
        symbol: String,
        library: String,
        exports: Vec<String>,
    },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Ffi(#[from] FfiError),
}

pub(crate) fn check_identifier(name: &str) -> Result<(), CodegenError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CodegenError::InvalidName {
            name: name.to_string(),
        })
    }
}
