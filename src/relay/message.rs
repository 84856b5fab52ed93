//! Wire format for the chat sink
//!
//! Discord-style message payloads: one embed per event, plus the response
//! types the client needs (message references, rate-limit bodies, reactions).
//! Only the data the events carry is formatted here; visual polish beyond
//! that is out of scope.

use serde::{Deserialize, Serialize};

use crate::grammar::{Event, EventKind};
use crate::normalize;

/// Outbound message payload (`POST`/`PATCH` body).
#[derive(Debug, Clone, Default, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// ISO-8601; rendered as the embed timestamp by the sink
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }
}

/// Reference to a posted message, as returned by the sink.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
    pub channel_id: String,
}

/// Body of a 429 response; `retry_after` is seconds, possibly fractional.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitBody {
    pub retry_after: f64,
    #[serde(default)]
    pub global: bool,
}

/// A user who reacted to a message (confirmation workflows).
#[derive(Debug, Clone, Deserialize)]
pub struct ReactionUser {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

fn kind_color(kind: EventKind) -> u32 {
    match kind {
        EventKind::PlayerKill => 0xE74C3C,
        EventKind::Suicide => 0x95A5A6,
        EventKind::Login => 0x2ECC71,
        EventKind::Logout => 0x7F8C8D,
        EventKind::ChatMessage => 0x3498DB,
        EventKind::TradePurchase | EventKind::TradeSale => 0xF1C40F,
        EventKind::AdminCommand => 0x9B59B6,
        EventKind::ViolationKick | EventKind::ViolationBan => 0xE67E22,
    }
}

/// Format one normalized event as an embed.
///
/// Identical events format identically, which keeps at-least-once delivery
/// harmless for readers.
pub fn event_embed(event: &Event) -> Embed {
    let mut fields = vec![EmbedField::inline("Player", event.actor.name.clone())];

    if let Some(steam_id) = &event.actor.steam_id {
        fields.push(EmbedField::inline("Steam ID", steam_id.clone()));
    }
    for (key, value) in &event.attributes {
        // Steam ids of secondary actors stay out of the embed body
        if key.ends_with("steam_id") {
            continue;
        }
        fields.push(EmbedField::inline(title_case(key), value.to_string()));
    }
    if let Some(location) = &event.location {
        fields.push(EmbedField::inline(
            "Location",
            normalize::format_location(location),
        ));
    }

    Embed {
        title: Some(event.kind.title().to_string()),
        description: None,
        color: Some(kind_color(event.kind)),
        timestamp: Some(event.timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        fields,
    }
}

/// Wrap an event embed in a message payload.
pub fn event_payload(event: &Event) -> MessagePayload {
    MessagePayload {
        content: None,
        embeds: vec![event_embed(event)],
    }
}

fn title_case(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn sample_event() -> Event {
        Grammar::builtin("kills")
            .unwrap()
            .parse_line("2024.06.01-18.02.11: Alice (76561198000000001) killed Bob (76561198000000002) with Weapon_AK47 from 132.7m at X=-51202.4 Y=12644.0 Z=7021.5")
            .unwrap()
    }

    #[test]
    fn test_event_embed_fields() {
        let embed = event_embed(&sample_event());
        assert_eq!(embed.title.as_deref(), Some("Player Kill"));
        assert_eq!(embed.timestamp.as_deref(), Some("2024-06-01T18:02:11Z"));

        let names: Vec<&str> = embed.fields.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"Player"));
        assert!(names.contains(&"Victim"));
        assert!(names.contains(&"Weapon"));
        assert!(names.contains(&"Location"));
        assert!(!names.contains(&"Victim_steam_id"));
    }

    #[test]
    fn test_identical_events_format_identically() {
        let a = serde_json::to_string(&event_payload(&sample_event())).unwrap();
        let b = serde_json::to_string(&event_payload(&sample_event())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rate_limit_body_parses_fractional_seconds() {
        let body: RateLimitBody =
            serde_json::from_str(r#"{"message":"You are being rate limited.","retry_after":1.337,"global":false}"#)
                .unwrap();
        assert_eq!(body.retry_after, 1.337);
        assert!(!body.global);
    }

    #[test]
    fn test_empty_embed_list_not_serialized() {
        let payload = MessagePayload {
            content: Some("restart in 5 minutes".to_string()),
            embeds: Vec::new(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("embeds"));
    }
}
