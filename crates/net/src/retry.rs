//! Retry logic and backoff calculations

use lspkg_errors::Error;
use std::future::Future;
use std::time::Duration;

/// Retry configuration for catalog downloads
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Initial backoff delay
    pub initial_delay: Duration,
    /// Maximum backoff delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl From<&lspkg_config::NetworkConfig> for RetryConfig {
    fn from(config: &lspkg_config::NetworkConfig) -> Self {
        Self {
            max_attempts: config.retries.max(1),
            initial_delay: config.retry_delay(),
            max_delay: config.max_retry_delay(),
            ..Self::default()
        }
    }
}

/// Calculate exponential backoff delay with jitter for the retry following
/// failed attempt number `attempt` (1-based)
#[must_use]
pub fn calculate_backoff_delay(retry_config: &RetryConfig, attempt: u32) -> Duration {
    // Precision loss acceptable for backoff calculations
    #[allow(clippy::cast_precision_loss)]
    let base_delay = retry_config
        .initial_delay
        .as_millis()
        .min(u128::from(u64::MAX)) as f64;
    #[allow(clippy::cast_precision_loss)]
    let max_delay = retry_config.max_delay.as_millis().min(u128::from(u64::MAX)) as f64;

    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let delay = (base_delay * retry_config.backoff_multiplier.powi(exponent)).min(max_delay);

    // Add jitter
    let jitter = delay * retry_config.jitter_factor * (rand::random::<f64>() - 0.5);

    // max(0.0) ensures non-negative, round() handles fractional part
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let final_delay = (delay + jitter).max(0.0).round() as u64;

    Duration::from_millis(final_delay)
}

/// Run `operation` until it succeeds or `max_attempts` is exhausted.
///
/// `operation` receives the 1-based attempt number. `on_error` observes every
/// failed attempt before the backoff sleep. Cancellation is never retried.
///
/// # Errors
///
/// Returns the last attempt's error once every attempt has failed.
pub async fn with_retry<T, F, Fut, E>(
    config: &RetryConfig,
    mut operation: F,
    mut on_error: E,
) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
    E: FnMut(u32, &Error),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                on_error(attempt, &err);
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = calculate_backoff_delay(config, attempt);
                tracing::debug!(attempt, max_attempts, ?delay, error = %err, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lspkg_errors::NetworkError;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(calculate_backoff_delay(&config, 1), Duration::from_millis(500));
        assert_eq!(calculate_backoff_delay(&config, 2), Duration::from_millis(1000));
        assert_eq!(calculate_backoff_delay(&config, 3), Duration::from_millis(2000));
        assert_eq!(calculate_backoff_delay(&config, 20), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = RetryConfig::default();
        for _ in 0..100 {
            let delay = calculate_backoff_delay(&config, 2);
            assert!(delay >= Duration::from_millis(950) && delay <= Duration::from_millis(1050));
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let mut failures = Vec::new();
        let result = with_retry(
            &fast_config(3),
            |attempt| async move {
                if attempt < 3 {
                    Err(NetworkError::DownloadFailed(format!("attempt {attempt}")).into())
                } else {
                    Ok(attempt)
                }
            },
            |attempt, _| failures.push(attempt),
        )
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(failures, vec![1, 2]);
    }

    #[tokio::test]
    async fn returns_last_error_when_exhausted() {
        let mut calls = 0;
        let err = with_retry(
            &fast_config(2),
            |attempt| {
                calls += 1;
                async move {
                    Err::<(), _>(Error::from(NetworkError::HttpError {
                        status: 500 + u16::try_from(attempt).unwrap(),
                        message: "server error".into(),
                    }))
                }
            },
            |_, _| {},
        )
        .await
        .unwrap_err();

        assert_eq!(calls, 2);
        assert!(matches!(
            err,
            Error::Network(NetworkError::HttpError { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn cancellation_is_not_retried() {
        let mut calls = 0;
        let err = with_retry(
            &fast_config(5),
            |_| {
                calls += 1;
                async { Err::<(), _>(Error::Cancelled) }
            },
            |_, _| {},
        )
        .await
        .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(calls, 1);
    }
}
