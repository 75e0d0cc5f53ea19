//! Retry executor for provider fetches with exponential backoff.
//!
//! Adapters classify a failed fetch through
//! [`GeocodeError::retry_strategy`](crate::error::GeocodeError::retry_strategy)
//! and run the fetch through this executor, so a flaky network hop gets a
//! second chance before the engine degrades that provider's slot to an
//! empty partial result.
//!
//! # Usage
//!
//! ```ignore
//! use anschrift::retry::RetryExecutor;
//! use anschrift::error::RetryStrategy;
//!
//! let executor = RetryExecutor::new();
//! let response = executor
//!     .execute(&RetryStrategy::network_backoff(), || async {
//!         client.get(url).send().await?.error_for_status()?;
//!         // ...
//!         # Ok(())
//!     })
//!     .await;
//! ```

use crate::error::{GeocodeError, RetryStrategy};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Executor for retry logic with configurable backoff strategies.
///
/// The executor wraps async operations and automatically retries them
/// according to the specified retry strategy.
#[derive(Debug, Default, Clone)]
pub struct RetryExecutor {
    /// Whether retry attempts are logged.
    log_retries: bool,
}

impl RetryExecutor {
    /// Create a new retry executor.
    pub fn new() -> Self {
        Self { log_retries: true }
    }

    /// Create a retry executor without logging.
    pub fn silent() -> Self {
        Self { log_retries: false }
    }

    /// Execute an async operation with automatic retry based on strategy.
    ///
    /// Returns the result of the operation, or the last error if all
    /// retries fail.
    pub async fn execute<F, Fut, T>(
        &self,
        strategy: &RetryStrategy,
        mut operation: F,
    ) -> Result<T, GeocodeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GeocodeError>>,
    {
        match strategy {
            RetryStrategy::NoRetry => operation().await,

            RetryStrategy::WaitAndRetry { wait } => match operation().await {
                Ok(v) => Ok(v),
                Err(e) => {
                    if self.log_retries {
                        warn!(wait_ms = wait.as_millis() as u64, error = %e, "fetch failed, waiting before retry");
                    }
                    sleep(*wait).await;
                    operation().await
                }
            },

            RetryStrategy::ExponentialBackoff {
                base_delay,
                max_delay,
                max_attempts,
            } => {
                let mut delay = *base_delay;
                let mut attempt = 0u32;

                loop {
                    match operation().await {
                        Ok(v) => {
                            if attempt > 0 && self.log_retries {
                                debug!(attempt, "fetch succeeded after retry");
                            }
                            return Ok(v);
                        }
                        Err(e) => {
                            attempt += 1;
                            if attempt >= *max_attempts {
                                return Err(e);
                            }
                            if self.log_retries {
                                warn!(
                                    attempt,
                                    max_attempts,
                                    delay_ms = delay.as_millis() as u64,
                                    error = %e,
                                    "fetch failed, backing off"
                                );
                            }
                            sleep(delay).await;
                            delay = (delay * 2).min(*max_delay);
                        }
                    }
                }
            }
        }
    }

    /// Execute an operation, picking the retry strategy from the first error.
    ///
    /// Runs `operation` once; on failure, consults the error's own
    /// `retry_strategy()` and re-runs under that strategy. A permanent
    /// error comes back unchanged after a single attempt.
    pub async fn execute_auto<F, Fut, T>(&self, mut operation: F) -> Result<T, GeocodeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GeocodeError>>,
    {
        match operation().await {
            Ok(v) => Ok(v),
            Err(first) => {
                let strategy = first.retry_strategy();
                if !strategy.should_retry() {
                    return Err(first);
                }
                self.execute(&strategy, operation).await
            }
        }
    }
}
