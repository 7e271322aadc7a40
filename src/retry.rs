use crate::options::ApiConfig;
use std::future::Future;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            jitter_max: Some(Duration::from_millis(250)),
        }
    }
}

impl RetryConfig {
    pub fn from_api(config: &ApiConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_backoff: config.retry_base_delay,
            max_backoff: config.retry_base_delay.saturating_mul(8),
            jitter_max: Some(config.retry_base_delay / 4),
        }
    }

    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter_max: None,
        }
    }
}

/// Run `f` until it succeeds, `retryable` rejects the error, or attempts run out.
/// The wait doubles after each failure, capped at `max_backoff`, plus random jitter.
pub async fn retry_async_with_config<F, Fut, T, E>(
    config: &RetryConfig,
    retryable: impl Fn(&E) -> bool,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 || !retryable(&e) {
                    return Err(e);
                }

                let wait = backoff.saturating_add(jitter(config.jitter_max));
                tracing::debug!(
                    attempts_left,
                    wait_ms = wait.as_millis() as u64,
                    "retrying request"
                );
                tokio::time::sleep(wait).await;

                backoff = backoff.saturating_mul(2).min(config.max_backoff);
            }
        }
    }
}

/// Random extra wait in `0..=max`, whole milliseconds.
fn jitter(max: Option<Duration>) -> Duration {
    match max {
        Some(j) if !j.is_zero() => {
            let bound = u64::try_from(j.as_millis()).unwrap_or(u64::MAX);
            Duration::from_millis(rand::random::<u64>() % bound.saturating_add(1))
        }
        _ => Duration::ZERO,
    }
}
