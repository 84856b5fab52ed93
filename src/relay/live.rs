//! Update-in-place messages for live status displays
//!
//! Status boards and leaderboards edit one pinned message instead of posting
//! a stream of new ones. The `(channel, message_id)` pair is tracked
//! separately from one-shot event posts, and edits are spaced by a minimum
//! interval so steady-state polling never trips the sink's rate limit.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::client::DeliveryClient;
use super::message::MessagePayload;
use crate::error::RelayError;

/// One live, editable message in a channel.
pub struct LiveMessage {
    channel_id: String,
    message_id: Option<String>,
    min_interval: Duration,
    last_push: Option<Instant>,
}

impl LiveMessage {
    pub fn new(channel_id: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: None,
            min_interval,
            last_push: None,
        }
    }

    /// Whether enough time has passed since the last push.
    fn ready(&self, now: Instant) -> bool {
        match self.last_push {
            None => true,
            Some(last) => now.duration_since(last) >= self.min_interval,
        }
    }

    /// Publish the payload: POST on first use, PATCH in place afterwards.
    ///
    /// Returns `Ok(false)` when skipped because the minimum interval has not
    /// elapsed. A 404 on edit means the message was deleted by a moderator;
    /// the next publish re-posts and tracks the new id.
    pub async fn publish(
        &mut self,
        client: &DeliveryClient,
        payload: &MessagePayload,
    ) -> Result<bool, RelayError> {
        let now = Instant::now();
        if !self.ready(now) {
            debug!("Live message update skipped (min interval not elapsed)");
            return Ok(false);
        }

        match &self.message_id {
            Some(message_id) => {
                match client
                    .edit_message(&self.channel_id, message_id, payload)
                    .await
                {
                    Ok(()) => {}
                    Err(RelayError::Delivery { status: 404 }) => {
                        info!("Live message disappeared, re-posting");
                        let posted = client.post_message(&self.channel_id, payload).await?;
                        self.message_id = Some(posted.id);
                    }
                    Err(e) => return Err(e),
                }
            }
            None => {
                let posted = client.post_message(&self.channel_id, payload).await?;
                self.message_id = Some(posted.id);
            }
        }

        self.last_push = Some(now);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_push_is_ready() {
        let live = LiveMessage::new("123", Duration::from_secs(30));
        assert!(live.ready(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_throttles() {
        let mut live = LiveMessage::new("123", Duration::from_secs(30));
        live.last_push = Some(Instant::now());

        assert!(!live.ready(Instant::now()));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(live.ready(Instant::now()));
    }
}
