//! Scheduled restart announcements
//!
//! Warns a channel ahead of each configured restart time and lets players
//! postpone the restart by reacting to the warning message. The actual
//! restart is behind [`ServerControl`] so the announcer can drive RCON, a
//! systemd unit, or nothing at all.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::{parse_clock_time, RestartConfig};
use crate::error::RelayError;
use crate::relay::{DeliveryClient, Embed, MessagePayload, MessageRef};

/// Something that can restart the game server.
#[async_trait]
pub trait ServerControl: Send + Sync {
    async fn restart(&self) -> Result<(), RelayError>;
}

/// Control backend that announces but never acts. Useful when restarts are
/// handled by an external supervisor and only the warnings are wanted.
pub struct AnnounceOnlyControl;

#[async_trait]
impl ServerControl for AnnounceOnlyControl {
    async fn restart(&self) -> Result<(), RelayError> {
        info!("Restart time reached, deferring to the external supervisor");
        Ok(())
    }
}

/// The next configured restart strictly after `now`, today or tomorrow.
pub fn next_restart_after(times: &[String], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut candidates = Vec::new();
    for time in times {
        let Some((hour, minute)) = parse_clock_time(time) else {
            continue;
        };
        let today = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), hour, minute, 0)
            .single()?;
        candidates.push(if today > now {
            today
        } else {
            today + chrono::Duration::days(1)
        });
    }
    candidates.into_iter().min()
}

/// Warning thresholds still ahead of `now`, largest first.
///
/// A process started inside a warning window must not fire the thresholds it
/// already missed; a "restart in 30 min" post 12 minutes before the restart
/// would be a lie.
fn due_thresholds(warn_minutes: &[u64], restart_at: DateTime<Utc>, now: DateTime<Utc>) -> Vec<u64> {
    let mut thresholds: Vec<u64> = warn_minutes
        .iter()
        .copied()
        .filter(|minutes| restart_at - chrono::Duration::minutes(*minutes as i64) > now)
        .collect();
    thresholds.sort_unstable_by(|a, b| b.cmp(a));
    thresholds
}

fn warning_payload(minutes_left: i64, postpone_emoji: &str) -> MessagePayload {
    let description = format!(
        "Server restart in **{minutes_left} min**. React with {postpone_emoji} to postpone."
    );
    MessagePayload {
        content: None,
        embeds: vec![Embed {
            title: Some("Scheduled Restart".to_string()),
            description: Some(description),
            color: Some(0xE67E22),
            timestamp: None,
            fields: Vec::new(),
        }],
    }
}

fn postponed_payload(minutes: u64) -> MessagePayload {
    MessagePayload {
        content: None,
        embeds: vec![Embed {
            title: Some("Restart Postponed".to_string()),
            description: Some(format!("Restart pushed back by {minutes} minutes.")),
            color: Some(0x2ECC71),
            timestamp: None,
            fields: Vec::new(),
        }],
    }
}

/// Posts warnings ahead of each restart and honors postpone reactions.
pub struct RestartAnnouncer {
    client: Arc<DeliveryClient>,
    control: Arc<dyn ServerControl>,
    config: RestartConfig,
}

impl RestartAnnouncer {
    pub fn new(
        client: Arc<DeliveryClient>,
        control: Arc<dyn ServerControl>,
        config: RestartConfig,
    ) -> Self {
        Self {
            client,
            control,
            config,
        }
    }

    /// Drive the announcement loop until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Restart announcer started (times: {:?})",
            self.config.times
        );

        loop {
            let Some(restart_at) = next_restart_after(&self.config.times, Utc::now()) else {
                warn!("No valid restart times configured, announcer idle");
                let _ = shutdown.changed().await;
                return;
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                done = self.announce_one(restart_at) => {
                    if let Err(e) = done {
                        warn!("Restart announcement cycle failed: {}", e);
                        // Back off before recomputing, the sink may be down
                        tokio::time::sleep(Duration::from_secs(60)).await;
                    }
                }
            }
        }

        info!("Restart announcer stopped");
    }

    /// Walk one restart through its warning thresholds, checking the last
    /// warning message for postpone reactions before acting.
    async fn announce_one(&self, mut restart_at: DateTime<Utc>) -> Result<(), RelayError> {
        let thresholds = due_thresholds(&self.config.warn_minutes, restart_at, Utc::now());
        let mut last_warning: Option<MessageRef> = None;

        for minutes in thresholds {
            let warn_at = restart_at - chrono::Duration::minutes(minutes as i64);
            sleep_until_wall(warn_at).await;

            let payload = warning_payload(minutes as i64, &self.config.postpone_emoji);
            let posted = self
                .client
                .post_message(&self.config.channel_id, &payload)
                .await?;
            info!("Posted restart warning ({} min)", minutes);
            last_warning = Some(posted);
        }

        sleep_until_wall(restart_at).await;

        let mut postponed = false;
        if let Some(warning) = &last_warning {
            let reactions = self
                .client
                .message_reactions(
                    &self.config.channel_id,
                    &warning.id,
                    &self.config.postpone_emoji,
                )
                .await
                .unwrap_or_default();
            if reactions.iter().any(|u| !u.bot) {
                postponed = true;
            }
        }

        if postponed {
            restart_at += chrono::Duration::minutes(self.config.postpone_minutes as i64);
            info!(
                "Restart postponed by reaction, new time {}",
                restart_at.format("%H:%M")
            );
            self.client
                .post_message(
                    &self.config.channel_id,
                    &postponed_payload(self.config.postpone_minutes),
                )
                .await?;
            sleep_until_wall(restart_at).await;
        }

        self.control.restart().await
    }
}

/// Sleep until the given wall-clock instant; past instants return at once.
async fn sleep_until_wall(at: DateTime<Utc>) {
    let now = Utc::now();
    if at <= now {
        return;
    }
    let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
    debug!("Sleeping {:?} until {}", wait, at.format("%H:%M:%S"));
    tokio::time::sleep(wait).await;
}
