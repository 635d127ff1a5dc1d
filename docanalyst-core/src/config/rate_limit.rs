//! Rate limiting configuration for oracle calls.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{AnalystError, Result};

/// Sliding-window limit on oracle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether calls are limited at all.
    pub enabled: bool,

    /// Calls allowed per window.
    pub max_calls: u32,

    /// Window length in seconds.
    pub period_secs: u64,
}

impl RateLimitConfig {
    /// Create an enabled limit.
    pub fn new(max_calls: u32, period_secs: u64) -> Self {
        Self {
            enabled: true,
            max_calls,
            period_secs,
        }
    }

    /// A configuration that never limits.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Window length.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.max_calls == 0 {
            return Err(AnalystError::configuration(
                "Rate limit max_calls must be greater than 0",
            ));
        }
        if self.period_secs == 0 {
            return Err(AnalystError::configuration(
                "Rate limit period must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60, 60)
    }
}
