//! Startup retries for the database connection.
//!
//! Attempts are spaced by exponential backoff and stop once the deadline
//! passes or the error is not worth retrying.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub first_delay: Duration,
    pub max_delay: Duration,
    pub growth: f64,
    /// Total time after which no further attempt is started
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::until(Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn until(deadline: Duration) -> Self {
        Self {
            first_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            growth: 2.0,
            deadline,
        }
    }

    fn schedule(&self) -> ExponentialBackoff {
        let mut schedule = ExponentialBackoff {
            current_interval: self.first_delay,
            initial_interval: self.first_delay,
            max_interval: self.max_delay,
            multiplier: self.growth,
            randomization_factor: 0.2,
            max_elapsed_time: Some(self.deadline),
            ..Default::default()
        };
        schedule.reset();
        schedule
    }
}

/// Run `attempt` until it succeeds, fails with an error `transient` rejects,
/// or the policy's deadline passes. The last error is returned.
pub async fn retry_until<T, E, F, Fut, P>(
    what: &str,
    policy: &RetryPolicy,
    transient: P,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut schedule = policy.schedule();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let err = match attempt().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(what, attempts, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !transient(&err) {
            return Err(err);
        }
        let Some(delay) = schedule.next_backoff() else {
            warn!(what, attempts, error = %err, "Giving up, retry deadline passed");
            return Err(err);
        };
        warn!(
            what,
            attempts,
            error = %err,
            retry_in_ms = delay.as_millis() as u64,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(deadline: Duration) -> RetryPolicy {
        RetryPolicy {
            first_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryPolicy::until(deadline)
        }
    }

    #[test]
    fn test_schedule_is_bounded_by_deadline() {
        let policy = RetryPolicy::until(Duration::from_secs(7));
        assert_eq!(policy.schedule().max_elapsed_time, Some(Duration::from_secs(7)));
        assert_eq!(RetryPolicy::default().deadline, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_until(
            "test",
            &quick(Duration::from_secs(5)),
            |_| true,
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("attempt {n}")) } else { Ok(n) }
            },
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn test_permanent_error_is_returned_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), &str> = retry_until(
            "test",
            &quick(Duration::from_secs(5)),
            |err| *err != "bad url",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("bad url")
            },
        )
        .await;
        assert_eq!(result, Err("bad url"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_deadline() {
        let result: Result<(), &str> = retry_until(
            "test",
            &quick(Duration::from_millis(20)),
            |_| true,
            || async { Err("down") },
        )
        .await;
        assert_eq!(result, Err("down"));
    }
}
