use std::sync::OnceLock;

use anyhow::{Error, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Initialize the tracing subscriber once: `RUST_LOG`-style filtering with
/// an `info` default, JSON-formatted events.
///
/// Subsequent calls are no-ops, so tests and the binary can both call this
/// freely.
///
/// # Errors
/// Fails when a global subscriber was already installed elsewhere.
pub fn init() -> Result<()> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false).json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|error| Error::msg(error.to_string()))?;

    let _ = TRACING_INIT.set(());
    Ok(())
}
