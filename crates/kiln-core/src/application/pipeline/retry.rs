//! Exponential backoff for transient I/O.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::application::pipeline::cancel::CancelFlag;
use crate::error::{KilnError, KilnResult};

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(25);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`,
    /// capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Run `op` until it succeeds, fails terminally, or retries run out.
    ///
    /// Returns the final outcome and the number of retries spent. Only
    /// errors with `KilnError::is_retryable` are retried; a set cancel flag
    /// stops the loop before the next attempt.
    pub async fn run<T, F, Fut>(&self, cancel: &CancelFlag, what: &str, mut op: F) -> (KilnResult<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = KilnResult<T>>,
    {
        let mut retries = 0;
        loop {
            let err = match op().await {
                Ok(value) => return (Ok(value), retries),
                Err(e) => e,
            };
            if !err.is_retryable() || retries >= self.max_retries {
                return (Err(err), retries);
            }

            let delay = self.delay(retries);
            retries += 1;
            warn!(
                operation = what,
                attempt = retries,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;

            if let Err(e) = cancel.check() {
                return (Err(KilnError::from(e)), retries);
            }
        }
    }
}
