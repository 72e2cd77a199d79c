use phillip_build::Toolchain;
use phillip_config::BuildConfig;
use phillip_types::TypeContext;

/// A fresh session, or `None` (with a note) when no toolchain is installed.
pub(crate) fn live_session() -> Option<TypeContext> {
    phillip_utils::init_logging();
    let config = BuildConfig::from_env();
    if !Toolchain::from_config(&config).is_available() {
        eprintln!("skipping: `{}` is not available", config.compiler());
        return None;
    }
    Some(TypeContext::new(config).unwrap())
}
