//! Live status board
//!
//! One pinned message summarizing every category: lines read, events
//! relayed, current position. Rebuilt on an interval and edited in place
//! through [`LiveMessage`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::engine::{CategoryStats, SharedStats};
use crate::relay::{DeliveryClient, Embed, EmbedField, LiveMessage, MessagePayload};

/// Build the board payload from the current counters.
pub fn status_payload(stats: &[(String, CategoryStats)]) -> MessagePayload {
    let fields = stats
        .iter()
        .map(|(name, s)| {
            EmbedField::inline(
                name.clone(),
                format!(
                    "line {} \u{00b7} {} relayed \u{00b7} {} failed",
                    s.last_line_number, s.events_relayed, s.events_failed
                ),
            )
        })
        .collect();

    let description = if stats.is_empty() {
        Some("No categories active yet.".to_string())
    } else {
        None
    };

    MessagePayload {
        content: None,
        embeds: vec![Embed {
            title: Some("Relay Status".to_string()),
            description,
            color: Some(0x3498DB),
            timestamp: Some(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
            fields,
        }],
    }
}

/// Periodically rebuild the board and push it until shutdown.
pub async fn run_status_board(
    client: Arc<DeliveryClient>,
    channel_id: String,
    interval: Duration,
    min_edit_interval: Duration,
    stats: SharedStats,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        "Status board started in #{} (interval: {:?})",
        channel_id, interval
    );
    let mut live = LiveMessage::new(channel_id, min_edit_interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first interval tick fires immediately; wait a full period so the
    // categories have something to report.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                let mut snapshot: Vec<(String, CategoryStats)> = stats
                    .lock()
                    .expect("stats lock poisoned")
                    .iter()
                    .map(|(name, s)| (name.clone(), *s))
                    .collect();
                snapshot.sort_by(|a, b| a.0.cmp(&b.0));

                let payload = status_payload(&snapshot);
                if let Err(e) = live.publish(&client, &payload).await {
                    warn!("Status board update failed: {}", e);
                }
            }
        }
    }

    info!("Status board stopped");
}
