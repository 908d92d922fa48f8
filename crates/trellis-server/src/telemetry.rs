//! Tracing subscriber bootstrap.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber with env-filter support.
///
/// The filter is read from `RUST_LOG`, defaulting to `info`. Calling this
/// more than once is harmless; later calls are ignored.
///
/// # Example
///
/// ```rust
/// trellis_server::init_tracing();
/// ```
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
