//! Rate-limit-aware HTTP delivery client
//!
//! Posts event embeds to the chat sink, honoring 429 responses with the
//! server-specified wait, bounded retries and a per-call wait budget so a
//! throttled sink can never hang a tick loop. Delivery is at-least-once:
//! a failure after the read step never rolls a checkpoint back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use super::message::{self, MessagePayload, MessageRef, RateLimitBody, ReactionUser};
use super::ratelimit::RateLimiter;
use crate::error::RelayError;
use crate::grammar::Event;

/// Outcome of one delivery attempt chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

/// Anything that can consume events, injected into the tick scheduler.
///
/// Resolved once at startup; a category without a sink is a construction-time
/// concern, not a per-call probe.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver one event to a channel. Must preserve call order per caller.
    async fn deliver(&self, channel_id: &str, event: &Event) -> DeliveryOutcome;
}

/// Connection settings for the chat sink.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// API base, e.g. `https://discord.com/api/v10`
    pub api_base: String,
    pub bot_token: String,
    pub timeout_secs: u64,
    /// Maximum retry attempts after a 429
    pub max_retries: u32,
    /// Total wait budget per delivery call; longer waits defer to next tick
    pub max_wait_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_base: "https://discord.com/api/v10".to_string(),
            bot_token: String::new(),
            timeout_secs: 10,
            max_retries: 3,
            max_wait_secs: 15,
        }
    }
}

/// What to do after a rate-limited attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryDecision {
    Wait(Duration),
    GiveUp,
}

/// Bounded-retry policy: `Pending -> Sent | RateLimited (attempt+1) | Failed`.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    max_total_wait: Duration,
}

impl RetryPolicy {
    fn decide(&self, attempt: u32, retry_after: Duration, waited: Duration) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::GiveUp;
        }
        if waited + retry_after > self.max_total_wait {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Wait(retry_after)
    }
}

/// HTTP client for the chat sink, shared by all categories.
pub struct DeliveryClient {
    http: reqwest::Client,
    config: DeliveryConfig,
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
}

impl DeliveryClient {
    pub fn new(config: DeliveryConfig) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let policy = RetryPolicy {
            max_retries: config.max_retries,
            max_total_wait: Duration::from_secs(config.max_wait_secs),
        };
        Ok(Self {
            http,
            config,
            policy,
            limiter: Arc::new(RateLimiter::new()),
        })
    }

    /// Post a new message, returning its reference for later edits.
    pub async fn post_message(
        &self,
        channel_id: &str,
        payload: &MessagePayload,
    ) -> Result<MessageRef, RelayError> {
        let url = self.messages_url(channel_id);
        let response = self
            .send_with_retry(|| self.request(Method::POST, &url).json(payload))
            .await?;
        Ok(response.json().await?)
    }

    /// Update an existing message in place.
    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: &MessagePayload,
    ) -> Result<(), RelayError> {
        let url = format!("{}/{message_id}", self.messages_url(channel_id));
        self.send_with_retry(|| self.request(Method::PATCH, &url).json(payload))
            .await?;
        Ok(())
    }

    /// Users who reacted to a message with the given emoji.
    pub async fn message_reactions(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<Vec<ReactionUser>, RelayError> {
        let url = format!(
            "{}/{message_id}/reactions/{}",
            self.messages_url(channel_id),
            urlencoding::encode(emoji)
        );
        let response = self
            .send_with_retry(|| self.request(Method::GET, &url))
            .await?;
        Ok(response.json().await?)
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!(
            "{}/channels/{channel_id}/messages",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bot {}", self.config.bot_token))
    }

    /// Issue a request, honoring the shared rate limiter and the 429 protocol.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, RelayError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt: u32 = 0;
        let mut waited = Duration::ZERO;

        loop {
            self.limiter.acquire().await;

            let response = build().send().await?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = extract_retry_after(response).await;
                self.limiter.note_rate_limited(retry_after).await;

                let wait = Duration::from_secs_f64(retry_after);
                match self.policy.decide(attempt, wait, waited) {
                    RetryDecision::Wait(wait) => {
                        debug!(
                            "Rate limited (attempt {}), retrying after {:?}",
                            attempt + 1,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                        waited += wait;
                        attempt += 1;
                        continue;
                    }
                    RetryDecision::GiveUp => {
                        warn!("Rate limited and retry budget exhausted, giving up");
                        return Err(RelayError::Delivery { status: 429 });
                    }
                }
            }

            self.note_budget_headers(&response).await;

            if !status.is_success() {
                return Err(RelayError::Delivery {
                    status: status.as_u16(),
                });
            }
            return Ok(response);
        }
    }

    async fn note_budget_headers(&self, response: &reqwest::Response) {
        let remaining = header_value(response, "x-ratelimit-remaining");
        let reset_after = header_value(response, "x-ratelimit-reset-after");
        if remaining.is_some() || reset_after.is_some() {
            self.limiter.update(remaining, reset_after).await;
        }
    }
}

fn header_value<T: std::str::FromStr>(response: &reqwest::Response, name: &str) -> Option<T> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Pull the wait duration out of a 429 response: the JSON body's
/// `retry_after` (seconds, possibly fractional) wins, falling back to the
/// `Retry-After` header, then to a conservative one second.
async fn extract_retry_after(response: reqwest::Response) -> f64 {
    let header: Option<f64> = header_value(&response, "retry-after");
    let body: Option<RateLimitBody> = response.json().await.ok();
    body.map(|b| b.retry_after).or(header).unwrap_or(1.0)
}

#[async_trait]
impl DeliverySink for DeliveryClient {
    async fn deliver(&self, channel_id: &str, event: &Event) -> DeliveryOutcome {
        let payload = message::event_payload(event);
        match self.post_message(channel_id, &payload).await {
            Ok(_) => DeliveryOutcome::Sent,
            Err(e) => {
                warn!(
                    "Delivery failed for '{}' event in #{}: {} (line: {})",
                    event.category, channel_id, e, event.raw_line
                );
                DeliveryOutcome::Failed
            }
        }
    }
}
