//! Decision model: what to do after a failed fetch.

use std::time::Duration;

use super::retry::RetryPolicy;

/// The next action after a fetch failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Sleep `delay`, then try again.
    Retry { delay: Duration, reason: String },

    /// Give up and mark the execution failed.
    MarkFailed { reason: String },
}

/// Decides the next action from the attempt counters.
///
/// Deciders are pure functions; the orchestrator performs the side effects
/// (ledger write, sleep).
pub trait Decider: Send + Sync {
    /// `failures` is the number of failed attempts so far, including the one
    /// that just happened (1-indexed).
    fn decide(&self, failures: u32, max_retries: u32) -> Decision;
}

/// Retry while `failures <= max_retries`, backing off per [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, failures: u32, max_retries: u32) -> Decision {
        if failures > max_retries {
            Decision::MarkFailed {
                reason: format!("max retries exceeded: {}/{}", failures - 1, max_retries),
            }
        } else {
            let delay = self.retry_policy.next_delay(failures);
            Decision::Retry {
                delay,
                reason: format!("retry {failures}/{max_retries} after {delay:?}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 60)]
    #[case(2, 120)]
    #[case(3, 240)]
    fn retries_until_ceiling(#[case] failures: u32, #[case] secs: u64) {
        let decider = DefaultDecider::default();
        match decider.decide(failures, 3) {
            Decision::Retry { delay, .. } => assert_eq!(delay, Duration::from_secs(secs)),
            other => panic!("expected retry, got {other:?}"),
        }
    }

    #[test]
    fn marks_failed_past_ceiling() {
        let decider = DefaultDecider::default();
        let decision = decider.decide(4, 3);
        assert!(matches!(decision, Decision::MarkFailed { ref reason } if reason.contains("3/3")));
    }

    #[test]
    fn zero_retries_fails_on_first_error() {
        let decider = DefaultDecider::default();
        assert!(matches!(decider.decide(1, 0), Decision::MarkFailed { .. }));
    }
}
