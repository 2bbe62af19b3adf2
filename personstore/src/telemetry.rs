//! Tracing bootstrap for binaries.

use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init() {
    init_with_default("info");
}

pub fn init_with_default(directives: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)))
        .try_init()
        .ok();
}
