use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use crate::client::SlackApiError;

/// Exponential backoff for Slack read calls. Only rate-limit errors are
/// retried; everything else is returned to the caller immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitRetry {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_elapsed: Duration,
}

impl Default for RateLimitRetry {
    fn default() -> Self {
        Self { base_delay_ms: 1_000, max_delay_ms: 30_000, max_elapsed: Duration::from_secs(60) }
    }
}

impl RateLimitRetry {
    pub fn with_max_elapsed_secs(secs: u64) -> Self {
        Self { max_elapsed: Duration::from_secs(secs), ..Self::default() }
    }

    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    pub async fn run<T, F, Fut>(&self, method: &str, mut operation: F) -> Result<T, SlackApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SlackApiError>>,
    {
        let started = Instant::now();
        let mut attempt = 0_u32;

        loop {
            let error = match operation().await {
                Err(error) if error.is_rate_limited() => error,
                other => return other,
            };

            let delay = self.backoff(attempt).max(error.retry_after().unwrap_or_default());
            if started.elapsed() + delay >= self.max_elapsed {
                warn!(
                    slack_method = method,
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "slack rate limit retries exhausted"
                );
                return Err(error);
            }

            warn!(
                slack_method = method,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "slack rate limited; backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::RateLimitRetry;
    use crate::client::SlackApiError;

    fn rate_limited() -> SlackApiError {
        SlackApiError::RateLimited { method: "conversations.replies".to_owned(), retry_after: None }
    }

    fn instant_policy() -> RateLimitRetry {
        RateLimitRetry { base_delay_ms: 0, max_delay_ms: 0, max_elapsed: Duration::from_secs(5) }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RateLimitRetry {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            max_elapsed: Duration::from_secs(60),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(10), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn retries_rate_limits_until_success() {
        let calls = AtomicUsize::new(0);
        let result = instant_policy()
            .run("conversations.replies", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(rate_limited())
                    } else {
                        Ok("page")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("page"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = instant_policy()
            .run("conversations.history", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(SlackApiError::Api {
                        method: "conversations.history".to_owned(),
                        error: "not_in_channel".to_owned(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(SlackApiError::Api { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_is_a_floor_on_the_backoff() {
        let policy = RateLimitRetry {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            max_elapsed: Duration::from_secs(60),
        };
        let calls = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result = policy
            .run("conversations.history", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err(SlackApiError::RateLimited {
                            method: "conversations.history".to_owned(),
                            retry_after: Some(Duration::from_secs(5)),
                        })
                    } else {
                        Ok("page")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("page"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn gives_up_once_the_time_budget_is_spent() {
        let policy =
            RateLimitRetry { base_delay_ms: 0, max_delay_ms: 0, max_elapsed: Duration::ZERO };
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = policy
            .run("conversations.replies", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            })
            .await;

        assert!(result.is_err_and(|error| error.is_rate_limited()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
