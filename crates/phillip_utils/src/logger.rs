use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str =
    "phillip=info,phillip_build=info,phillip_types=info,phillip_codegen=info,phillip_ffi=info";

/// Initialise tracing subscriber once per process.
///
/// `RUST_LOG` overrides the default filter, e.g.
/// `RUST_LOG=phillip_build=debug` to see every toolchain command line.
pub fn init_logging() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    });
}
