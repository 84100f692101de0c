use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Linear backoff: the wait after failed attempt `n` (1-based) is `n * base_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Runs `op` until it succeeds or the attempt ceiling is reached, logging a
    /// warning for every failed attempt. The last error is returned.
    pub async fn run<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(label, op, |_| true).await
    }

    /// Like [`run`](Self::run), but errors rejected by `retryable` are
    /// returned at once.
    pub async fn run_if<T, E, F, Fut, P>(&self, label: &str, mut op: F, retryable: P) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts && retryable(&e) => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.attempts,
                        "{} failed, retrying in {:?}: {}",
                        label,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(attempts = attempt, "{} failed permanently: {}", label, e);
                    return Err(e);
                }
            }
        }
    }
}
