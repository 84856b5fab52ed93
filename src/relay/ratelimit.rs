//! Shared per-endpoint rate-limit tracking
//!
//! All categories funnel into the same external endpoint, so the remaining
//! budget derived from prior responses is a single process-wide instance per
//! endpoint, shared behind a mutex. State is memory-only: after a restart the
//! first call re-probes the limit conservatively.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct RateLimitState {
    /// Requests left in the current window, if the server told us
    remaining: Option<u32>,
    /// When the window resets
    reset_at: Option<Instant>,
}

/// Tracks one endpoint's request budget across all categories.
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<RateLimitState>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until a request may be sent.
    ///
    /// Sleeps only when the server has told us the budget is exhausted and
    /// the reset lies in the future. Callers on other categories sharing this
    /// limiter are unaffected while one of them sleeps.
    pub async fn acquire(&self) {
        let wait = {
            let state = self.state.lock().await;
            match (state.remaining, state.reset_at) {
                (Some(0), Some(reset_at)) => reset_at.checked_duration_since(Instant::now()),
                _ => None,
            }
        };
        if let Some(wait) = wait {
            debug!("Rate limit budget exhausted, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Record the budget headers of a successful response.
    pub async fn update(&self, remaining: Option<u32>, reset_after_secs: Option<f64>) {
        let mut state = self.state.lock().await;
        state.remaining = remaining;
        state.reset_at = reset_after_secs.map(|s| Instant::now() + Duration::from_secs_f64(s));
    }

    /// Record a 429: no budget until the server-specified wait has passed.
    pub async fn note_rate_limited(&self, retry_after_secs: f64) {
        let mut state = self.state.lock().await;
        state.remaining = Some(0);
        state.reset_at = Some(Instant::now() + Duration::from_secs_f64(retry_after_secs));
    }
}
