//! Logger initialization, modeled on `homestar-runtime`'s `logger.rs`
//! with the console/logfmt/IPFS-specific extras dropped per `DESIGN.md`
//! — nothing in this crate needs them.

use anyhow::Result;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize a default [tracing_subscriber] [fmt::Subscriber], reading
/// the `RUST_LOG` environment variable (falling back to `info`).
///
/// Idempotent to call more than once within a process (e.g. across
/// repeated test runs): a subscriber already set is left in place.
pub fn init() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    // A worker pool may call this more than once across tests in the
    // same process; only the first call can win the global subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
    Ok(())
}
