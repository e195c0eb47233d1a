//! Bounded retries with backoff for operations that may fail transiently.

use std::{fmt, future::Future, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Delay before the first retry.
    pub backoff: Duration,
    /// Double the delay after every failed retry.
    pub exponential: bool,
}

impl Policy {
    pub fn fixed(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts,
            backoff,
            exponential: false,
        }
    }

    pub fn exponential(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts,
            backoff,
            exponential: true,
        }
    }

    fn delay(&self, retry: u32) -> Duration {
        if self.exponential {
            self.backoff
                .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
        } else {
            self.backoff
        }
    }

    /// Runs the operation until it succeeds, fails with an error that is not
    /// retryable or runs out of attempts. Returns the last error.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        retryable: impl Fn(&E) -> bool,
        mut f: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts && retryable(&err) => {
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis(),
                        %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::sync::atomic::{AtomicU32, Ordering}};

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = Policy::exponential(5, Duration::from_secs(1))
            .run("test", |_| true, || async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err("transient".to_string()),
                    n => Ok(n),
                }
            })
            .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_attempts_or_on_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = Policy::fixed(3, Duration::from_secs(10))
            .run("test", |_| true, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            })
            .await;
        assert_eq!(result, Err("down".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let calls = AtomicU32::new(0);
        let result: Result<(), String> = Policy::fixed(3, Duration::from_secs(10))
            .run("test", |err: &String| err != "fatal", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("fatal".to_string())
            })
            .await;
        assert_eq!(result, Err("fatal".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exponential_delays_double() {
        let policy = Policy::exponential(4, Duration::from_secs(5));
        assert_eq!(policy.delay(1), Duration::from_secs(5));
        assert_eq!(policy.delay(2), Duration::from_secs(10));
        assert_eq!(policy.delay(3), Duration::from_secs(20));
    }
}
