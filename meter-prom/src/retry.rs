use std::time::Duration;

use futures::Future;
use rand::Rng;

use crate::errors::PromError;

/// Configuration for retry behavior
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,

    /// Initial backoff duration before first retry
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Factor to apply random jitter (0-1)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

/// Executes an async query operation with retry logic.
///
/// Retries only errors that a retry could fix (connection failures,
/// server-side errors, throttling); empty results and decode failures
/// surface immediately.
pub async fn with_retry<F, Fut, T>(mut operation: F, config: &RetryConfig) -> Result<T, PromError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PromError>>,
{
    let mut current_retry = 0;
    let mut current_backoff = config.initial_backoff;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if current_retry >= config.max_retries || !error.is_retryable() {
                    return Err(error);
                }

                let jitter_range =
                    (current_backoff.as_millis() as f64 * config.jitter_factor) as u64;
                let jitter = if jitter_range > 0 {
                    rand::thread_rng().gen_range(0..jitter_range)
                } else {
                    0
                };

                let sleep_duration = current_backoff.saturating_add(Duration::from_millis(jitter));
                log::warn!(
                    "query attempt {} failed ({}), retrying in {:?}",
                    current_retry + 1,
                    error,
                    sleep_duration
                );
                tokio::time::sleep(sleep_duration).await;

                current_retry += 1;

                let next_backoff_millis =
                    current_backoff.as_millis() as f64 * config.backoff_multiplier;
                current_backoff = Duration::from_millis(
                    next_backoff_millis.min(config.max_backoff.as_millis() as f64) as u64,
                );
            }
        }
    }
}
