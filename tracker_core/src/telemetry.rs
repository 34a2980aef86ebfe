//! Centralized tracing initialization for the tracker and sampler nodes.
//!
//! Mirrors the shared-lib pattern the rest of this pipeline uses: a single
//! `init_tracing` call, respecting `RUST_LOG`, with no per-node divergence.

use tracing::subscriber::DefaultGuard;

/// Initialize tracing with a thread-local subscriber.
///
/// Returns a `DefaultGuard` that must be kept alive for the duration of the
/// process; dropping it tears the subscriber back down.
pub fn init_tracing() -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_default(subscriber)
}
