use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::fetch::FetchError;

/// Errors that know whether repeating the operation may help
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        FetchError::is_transient(self)
    }
}

/// Bounded retry for stages whose collaborators are safe to call again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    pub result: T,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Last error, after every allowed attempt or a permanent failure
    Failed { error: E, attempts: u32 },
    /// Cancelled while waiting to retry
    Cancelled { attempts: u32 },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.fetch_retries, config.retry_delay())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
    /// `operation` receives the zero-based attempt number.
    pub async fn run<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<RetryOutcome<T>, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match operation(attempt).await {
                Ok(result) => {
                    return Ok(RetryOutcome {
                        result,
                        attempts: attempt + 1,
                    });
                }
                Err(error) => {
                    attempt += 1;
                    if !error.is_transient() || attempt >= self.max_attempts() {
                        return Err(RetryError::Failed {
                            error,
                            attempts: attempt,
                        });
                    }

                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts(),
                        delay_ms = self.delay.as_millis() as u64,
                        "Transient failure, retrying: {}",
                        error
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(RetryError::Cancelled { attempts: attempt });
                        }
                        _ = sleep(self.delay) => {}
                    }
                }
            }
        }
    }
}
