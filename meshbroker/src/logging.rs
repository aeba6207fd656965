//! Logging initialization.
//!
//! Structured logging via `tracing`, filtered by `RUST_LOG` (default
//! `info`). The broker is a foreground process, so everything goes to
//! stdout; embedders that install their own subscriber simply skip this.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Safe to call once per process. Returns an error if a subscriber is
/// already installed.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init()
}
