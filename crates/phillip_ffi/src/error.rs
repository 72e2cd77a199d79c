#[derive(Debug, thiserror::Error)]
pub enum FfiError {
    /// The requested marshaling has no FFI representation.
    #[error("cannot marshal {what} through the FFI layer")]
    UnsupportedMarshal { what: String },

    #[error("argument mismatch: expected {expected}, found {found}")]
    ArgumentMismatch { expected: String, found: String },

    #[error("symbol `{symbol}` not found in {library}")]
    SymbolNotFound { symbol: String, library: String },
}
