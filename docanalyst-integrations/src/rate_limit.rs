//! Sliding-window rate limiting for oracle calls.

use async_trait::async_trait;
use docanalyst_core::{AnalystError, LanguageModel, Prompt, Result, config::RateLimitConfig};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Allows at most `max_calls` acquisitions in any window of `period`.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter.
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1) as usize,
            period,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a limiter from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_calls, config.period())
    }

    /// Wait until a call is allowed, then record it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                self.evict(&mut calls, now);

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return;
                }

                // The window is full; the oldest call leaves it first.
                calls.front().map_or(Duration::ZERO, |oldest| {
                    (*oldest + self.period).saturating_duration_since(now)
                })
            };

            debug!(wait_ms = wait.as_millis(), "Rate limit reached, waiting");
            sleep(wait).await;
        }
    }

    /// Record a call if one is allowed right now.
    pub async fn try_acquire(&self) -> Result<()> {
        let mut calls = self.calls.lock().await;
        let now = Instant::now();
        self.evict(&mut calls, now);

        if calls.len() < self.max_calls {
            calls.push_back(now);
            Ok(())
        } else {
            Err(AnalystError::RateLimit)
        }
    }

    /// Calls still left in the current window.
    pub async fn remaining(&self) -> usize {
        let mut calls = self.calls.lock().await;
        self.evict(&mut calls, Instant::now());
        self.max_calls - calls.len()
    }

    fn evict(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while calls
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.period)
        {
            calls.pop_front();
        }
    }
}

/// Oracle wrapper that waits for the rate limiter before every call.
#[derive(Debug)]
pub struct RateLimitedOracle<O> {
    inner: O,
    limiter: RateLimiter,
}

impl<O: LanguageModel> RateLimitedOracle<O> {
    /// Wrap `inner` with `limiter`.
    pub fn new(inner: O, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }

    /// The wrapped oracle.
    pub fn inner(&self) -> &O {
        &self.inner
    }

    /// The limiter in front of the oracle.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[async_trait]
impl<O: LanguageModel> LanguageModel for RateLimitedOracle<O> {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.limiter.acquire().await;
        self.inner.complete(prompt).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn model(&self) -> Option<&str> {
        self.inner.model()
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
