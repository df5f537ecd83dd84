// 📝 Logging - tracing subscriber setup
// The library only emits `tracing` events; binaries and tests that want to see
// them call `init_logging` once.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when RUST_LOG is not set
pub const DEFAULT_DIRECTIVE: &str = "revenue_ingest=info";

/// Install the global subscriber with the default filter
pub fn init_logging() -> Result<()> {
    init_logging_with(DEFAULT_DIRECTIVE)
}

/// Install the global subscriber; RUST_LOG wins over `default_directive`
///
/// Fails if a global subscriber is already set.
pub fn init_logging_with(default_directive: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .with_context(|| format!("Invalid log directive '{}'", default_directive))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .context("Global tracing subscriber already set")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // Only test in the crate that installs a subscriber
        let _ = init_logging_with("revenue_ingest=debug");
        assert!(init_logging().is_err());
    }
}
