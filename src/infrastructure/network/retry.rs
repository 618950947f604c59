// Retry logic with exponential backoff
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based): doubles each time, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or `max_retries` retries are used up.
///
/// Returns the final result and how many attempts failed along the way.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> (Result<T, E>, u32)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failures = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if failures > 0 {
                    debug!("Request succeeded after {} retries", failures);
                }
                return (Ok(result), failures);
            }
            Err(err) => {
                failures += 1;

                if failures > config.max_retries {
                    if config.max_retries > 0 {
                        warn!("Request failed after {} attempts: {}", failures, err);
                    }
                    return (Err(err), failures);
                }

                let delay = config.delay_for(failures);
                warn!(
                    "Request failed (attempt {}/{}): {}. Retrying in {}ms...",
                    failures,
                    config.max_retries + 1,
                    err,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(1), Duration::from_millis(1000));
        assert_eq!(config.delay_for(2), Duration::from_millis(2000));
        assert_eq!(config.delay_for(3), Duration::from_millis(4000));
        assert_eq!(config.delay_for(10), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let (result, failures) = with_retry(&RetryConfig::default(), move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("boom")
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(failures, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let (result, failures) = with_retry(&RetryConfig::none(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("offline")
        })
        .await;

        assert_eq!(result, Err("offline"));
        assert_eq!(failures, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
