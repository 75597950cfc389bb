//! Backoff for consecutive remote failures within one fetch run.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before the run gives up.
    pub max_retries: u32,
    /// Base of the exponential backoff.
    pub unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Whether the run may retry after `error_count` consecutive failures.
    pub fn should_retry(&self, error_count: u32) -> bool {
        error_count <= self.max_retries
    }

    /// Wait before retrying after `error_count` consecutive failures:
    /// `unit * 2^(error_count + 1)`.
    pub fn backoff(&self, error_count: u32) -> Duration {
        let exponent = (error_count + 1).min(16);
        self.unit * 2u32.pow(exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            unit: Duration::from_secs(1),
        }
    }
}
