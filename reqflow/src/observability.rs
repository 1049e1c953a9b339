//! Tracing setup for embedding binaries and tests.

use tracing_subscriber::EnvFilter;

/// Installs a global tracing subscriber honoring `RUST_LOG`.
///
/// Falls back to `info` when no filter is configured. Calling this more
/// than once is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
