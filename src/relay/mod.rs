//! Delivery to the external chat sink
//!
//! - [`client`]: HTTP client with 429 retry/backoff and bounded waits
//! - [`ratelimit`]: per-endpoint budget shared by all categories
//! - [`message`]: wire payloads (embeds, rate-limit bodies, reactions)
//! - [`live`]: update-in-place messages for status boards

pub mod client;
pub mod live;
pub mod message;
pub mod ratelimit;

pub use client::{DeliveryClient, DeliveryConfig, DeliveryOutcome, DeliverySink};
pub use live::LiveMessage;
pub use message::{Embed, EmbedField, MessagePayload, MessageRef, ReactionUser};
pub use ratelimit::RateLimiter;
