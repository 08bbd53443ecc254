//! Bounded at-least-once execution of a single run step
//!
//! Stand-in for a durable step-execution substrate: a step is re-executed
//! after a retryable failure, with exponential backoff, until it succeeds,
//! fails permanently, or the attempt budget runs out. Steps must therefore be
//! safe to repeat.

use log::{debug, warn};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors a step can report, classified for retry decisions
pub trait Retryable {
    /// Whether repeating the step could plausibly succeed
    fn is_retryable(&self) -> bool;
}

/// Attempt budget and backoff for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// A budget of zero attempts is treated as one
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Retry immediately, no backoff
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the attempt following `attempt` (1-based)
    ///
    /// `base * 2^(attempt - 1)`, capped at the configured maximum.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}

/// A step that completed, with the attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSuccess<T> {
    pub value: T,
    pub attempts: u32,
}

/// A step that gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepFailure<E> {
    /// Non-retryable error; the step was not repeated
    Permanent { attempts: u32, error: E },
    /// Every attempt in the budget failed
    Exhausted { attempts: u32, error: E },
}

impl<E> StepFailure<E> {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub fn error(&self) -> &E {
        match self {
            Self::Permanent { error, .. } | Self::Exhausted { error, .. } => error,
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Execute `operation` under `policy`
///
/// The closure receives the 1-based attempt number and is invoked once per
/// attempt, so each attempt gets a fresh future.
pub async fn run_step<T, E, F, Fut>(
    step: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<StepSuccess<T>, StepFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Step '{step}' succeeded on attempt {attempt}");
                }
                return Ok(StepSuccess {
                    value,
                    attempts: attempt,
                });
            }
            Err(error) if !error.is_retryable() => {
                warn!("Step '{step}' failed permanently on attempt {attempt}: {error}");
                return Err(StepFailure::Permanent {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) if attempt >= policy.max_attempts() => {
                warn!("Step '{step}' gave up after {attempt} attempt(s): {error}");
                return Err(StepFailure::Exhausted {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) => {
                let delay = policy.delay_after(attempt);
                debug!(
                    "Step '{step}' attempt {attempt}/{} failed: {error}; retrying in {delay:?}",
                    policy.max_attempts()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Flaky(bool);

    impl Retryable for Flaky {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    impl Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(retryable={})", self.0)
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(350));
        assert_eq!(policy.delay_after(40), Duration::from_millis(350));
    }

    #[test]
    fn zero_budget_means_one_attempt() {
        assert_eq!(RetryPolicy::immediate(0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = run_step("flaky", &RetryPolicy::immediate(5), move |_| async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Flaky(true))
            } else {
                Ok("done")
            }
        })
        .await;

        let success = result.expect("step should succeed");
        assert_eq!(success.value, "done");
        assert_eq!(success.attempts, 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<StepSuccess<()>, _> =
            run_step("broken", &RetryPolicy::immediate(5), move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(false))
            })
            .await;

        assert!(matches!(result, Err(StepFailure::Permanent { attempts: 1, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn budget_is_exact() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<StepSuccess<()>, _> =
            run_step("always failing", &RetryPolicy::immediate(4), move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Flaky(true))
            })
            .await;

        let failure = result.expect_err("budget should run out");
        assert!(failure.is_exhausted());
        assert_eq!(failure.attempts(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
