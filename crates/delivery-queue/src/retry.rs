//! Fixed-delay retry for peer calls.

use crate::DeliveryResult;
use exchange_config_and_utils::DeliveryConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(500),
        }
    }
}

impl From<&DeliveryConfig> for RetryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget is
/// spent. The last error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> DeliveryResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = DeliveryResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(request = %label, attempt, "Sending");

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                error!(
                    request = %label,
                    attempt,
                    status = ?e.status(),
                    error = %e,
                    "Attempt failed"
                );
                if e.is_permanent() {
                    return Err(e);
                }
                if attempt >= max_attempts {
                    warn!(request = %label, attempts = attempt, "Giving up");
                    return Err(e);
                }
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
