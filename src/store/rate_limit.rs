use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::errors::AppError;

use super::KvStore;

/// Fixed-window limiter: at most `max` hits per subject per `window`.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    max: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, max: u64, window: Duration) -> Self {
        RateLimiter { store, max, window }
    }

    /// Count one hit for `subject`, failing once the window is used up.
    pub async fn check(&self, subject: &str) -> Result<(), AppError> {
        let hits = self.store.incr(&format!("rl:{}", subject), self.window).await;
        if hits > self.max {
            warn!("Rate limit hit for {} ({} in window)", subject, hits);
            return Err(AppError::RateLimited(format!(
                "more than {} requests in {}s",
                self.max,
                self.window.as_secs()
            )));
        }
        Ok(())
    }
}
