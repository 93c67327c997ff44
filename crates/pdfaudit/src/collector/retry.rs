use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::config::RetryConfig;
use crate::error::FetchError;

/// Exponential backoff policy for page fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let millis = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// Runs `fetch`, retrying transient failures with backoff.
///
/// Permanent failures return immediately. Once `cancel` is observed no
/// further attempt is started and the last transient error is returned.
pub fn fetch_with_retry<T, F>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut fetch: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let mut retry = 0;
    loop {
        match fetch() {
            Ok(value) => {
                if retry > 0 {
                    debug!(what, retries = retry, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && retry < policy.max_retries => {
                if cancel.is_cancelled() {
                    debug!(what, "Not retrying, pass cancelled");
                    return Err(e);
                }
                retry += 1;
                let delay = policy.backoff(retry);
                warn!(what, retry, ?delay, error = %e, "Transient fetch failure, backing off");
                std::thread::sleep(delay);
                if cancel.is_cancelled() {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
