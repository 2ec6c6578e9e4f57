use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_DIRECTIVES: &str = "warn,rigbook=info";

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
