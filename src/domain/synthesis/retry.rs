use super::error::SynthesisError;
use std::future::Future;
use std::time::Duration;

/// Caller-side retry policy for remote synthesis calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first
    pub retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Run `operation`, retrying retryable failures with doubling backoff
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, SynthesisError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SynthesisError>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retries && e.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(
                        operation = label,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying synthesis call"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
