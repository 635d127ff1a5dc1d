//! Tracing subscriber setup for applications.
//!
//! Library crates only emit `tracing` events; installing a subscriber is the
//! application's call.

use docanalyst_core::{AnalystError, Result};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a formatting subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` (for example the configured
/// `log_level`) is used as the filter.
///
/// # Errors
///
/// Returns a configuration error for an unparsable `level`, and an internal
/// error when a global subscriber is already installed.
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            AnalystError::configuration(format!("Invalid log level '{level}': {e}"))
        })?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| AnalystError::internal(format!("Failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_reported() {
        init_tracing("debug").unwrap();

        let err = init_tracing("info").unwrap_err();
        assert!(matches!(err, AnalystError::Internal { .. }));
    }
}
