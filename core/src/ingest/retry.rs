use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::SinkError;

pub trait RetryStrategy: Send + Sync {
    fn name(&self) -> &str;
    /// Delay before retry number `attempt` (0-based), or `None` when exhausted.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
    fn max_retries(&self) -> u32;
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    factor: u32,
    max_delay: Duration,
    max_retries: u32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, factor: u32, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base,
            factor: factor.max(1),
            max_delay,
            max_retries,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.base_delay_ms),
            cfg.factor,
            Duration::from_millis(cfg.max_delay_ms),
            cfg.max_retries,
        )
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn name(&self) -> &str {
        "exponential-backoff"
    }

    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let multiplier = self.factor.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(multiplier);
        Some(delay.min(self.max_delay))
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Decides whether a failed batch send is retried, and after how long.
#[derive(Clone)]
pub struct RetryPolicy {
    enabled: bool,
    strategy: Arc<dyn RetryStrategy>,
    retryable_status: Vec<u16>,
}

impl RetryPolicy {
    pub fn new(strategy: Arc<dyn RetryStrategy>, retryable_status: Vec<u16>) -> Self {
        Self {
            enabled: true,
            strategy,
            retryable_status,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            strategy: Arc::new(ExponentialBackoff::from_config(cfg)),
            retryable_status: cfg.retryable_status.clone(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            strategy: Arc::new(ExponentialBackoff::new(Duration::ZERO, 1, Duration::ZERO, 0)),
            retryable_status: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Transport failures carry no status and are never retried.
    pub fn is_retryable(&self, err: &SinkError) -> bool {
        err.status
            .is_some_and(|s| self.retryable_status.contains(&s))
    }

    /// Delay before the next attempt, given how many retries already ran.
    pub fn next_delay(&self, retries_so_far: u32, err: &SinkError) -> Option<Duration> {
        if !self.enabled || !self.is_retryable(err) {
            return None;
        }
        self.strategy.next_delay(retries_so_far)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("enabled", &self.enabled)
            .field("strategy", &self.strategy.name())
            .field("retryable_status", &self.retryable_status)
            .finish()
    }
}
