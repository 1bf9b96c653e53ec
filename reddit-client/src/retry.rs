use search_core::{CoreError, ErrorExt};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 300,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after a server-specified delay
    RetryWithDelay(Duration),
    /// Don't retry (for permanent failures)
    NoRetry,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    if !error.is_retryable() {
        return RetryStrategy::NoRetry;
    }
    match error.retry_after() {
        Some(delay) => RetryStrategy::RetryWithDelay(delay),
        None => RetryStrategy::Retry,
    }
}

/// Delay before attempt `attempt + 1`: `base * multiplier^attempt`, capped.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = (config.base_delay_ms as f64 * multiplier) as u64;
    Duration::from_millis(delay_ms.min(config.max_delay_ms))
}

/// Retry executor that wraps operations with retry logic
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation with retry logic.
    ///
    /// Permanent failures are returned after the first attempt. When every
    /// attempt fails, the error from the last attempt is returned unchanged.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        operation: F,
    ) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut total_delay = Duration::ZERO;
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            "Operation {} succeeded after {} retries (total delay: {:?})",
                            operation_name, attempt, total_delay
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            debug!(
                "Attempt {} failed for {}: {}",
                attempt + 1,
                operation_name,
                error
            );

            let has_attempts_left = attempt + 1 < max_attempts;
            let delay = match get_retry_strategy(&error) {
                RetryStrategy::NoRetry => {
                    debug!(
                        "Not retrying {} due to error type: {}",
                        operation_name, error
                    );
                    return Err(error);
                }
                _ if !has_attempts_left => {
                    error!(
                        "Operation {} failed after {} attempts with total delay of {:?}",
                        operation_name, max_attempts, total_delay
                    );
                    return Err(error);
                }
                RetryStrategy::Retry => calculate_delay(attempt, &self.config),
                RetryStrategy::RetryWithDelay(delay) => {
                    delay.min(Duration::from_millis(self.config.max_delay_ms))
                }
            };

            warn!(
                "Retrying {} in {:?} due to: {}",
                operation_name, delay, error
            );
            total_delay += delay;
            sleep(delay).await;
            attempt += 1;
        }
    }
}
