//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Exponential backoff between fetch attempts.
///
/// delay = base_delay * multiplier^(attempt - 1)
///
/// With the default policy (base 1 min, multiplier 2.0):
/// - attempt 1 (first failure): 1 min
/// - attempt 2: 2 min
/// - attempt 3: 4 min
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Backoff multiplier.
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64) -> Self {
        Self {
            base_delay,
            multiplier,
        }
    }

    /// Delay to wait after the `attempt`-th failure (1-indexed).
    ///
    /// `attempt == 0` is treated like 1.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 2.0)
    }
}
