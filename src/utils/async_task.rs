use std::time::Duration;

use tokio::time::sleep;
use tokio::time::timeout;
use tracing::warn;

use crate::BackoffPolicy;
use crate::NetworkError;

/// Runs `task` under a per-attempt deadline with exponential backoff between
/// attempts. Returns the last real error once the attempt budget is spent.
pub(crate) async fn retry_with_timeout<F, T, P>(
    task: F,
    policy: &BackoffPolicy,
) -> Result<P, NetworkError>
where
    F: Fn() -> T,
    T: std::future::Future<Output = Result<P, NetworkError>>,
{
    let attempts = policy.max_retries.max(1);
    let timeout_duration = Duration::from_millis(policy.timeout_ms);
    let mut delay = Duration::from_millis(policy.base_delay_ms);
    let mut last = NetworkError::RetryExhausted(attempts);
    for attempt in 1..=attempts {
        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => {
                return Ok(r);
            }
            Ok(Err(e)) => {
                warn!("attempt {}/{} failed: {}", attempt, attempts, e);
                last = e;
            }
            Err(_) => {
                warn!("attempt {}/{} timed out", attempt, attempts);
                last = NetworkError::Timeout(timeout_duration);
            }
        }
        if attempt < attempts {
            sleep(delay).await;
            delay = (delay * 2).min(Duration::from_millis(policy.max_delay_ms));
        }
    }
    Err(last)
}
