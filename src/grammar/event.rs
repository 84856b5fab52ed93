//! Structured events produced by the line grammars

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

/// What kind of event a matched line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PlayerKill,
    Suicide,
    Login,
    Logout,
    ChatMessage,
    TradePurchase,
    TradeSale,
    AdminCommand,
    ViolationKick,
    ViolationBan,
}

impl EventKind {
    /// Human-readable title used for outbound messages.
    pub fn title(&self) -> &'static str {
        match self {
            EventKind::PlayerKill => "Player Kill",
            EventKind::Suicide => "Suicide",
            EventKind::Login => "Player Connected",
            EventKind::Logout => "Player Disconnected",
            EventKind::ChatMessage => "Chat Message",
            EventKind::TradePurchase => "Trader Purchase",
            EventKind::TradeSale => "Trader Sale",
            EventKind::AdminCommand => "Admin Command",
            EventKind::ViolationKick => "Player Kicked",
            EventKind::ViolationBan => "Player Banned",
        }
    }
}

/// The player (or admin) a line is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    /// In-game display name, Unicode preserved
    pub name: String,
    /// Server-local player id, when the line carries one
    pub player_id: Option<String>,
    /// Steam id, when the line carries one
    pub steam_id: Option<String>,
}

/// A world position captured from the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// An attribute value extracted from a line.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Text(_) => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One structured event parsed from a single log line.
///
/// The timestamp comes from the line itself, not the wall clock, so event
/// ordering stays correct even when delivery lags. Events are immutable once
/// constructed and consumed exactly once by the delivery sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Timestamp parsed from the log line (server-local, the server logs UTC)
    pub timestamp: NaiveDateTime,
    /// Category that produced the event (kills, logins, ...)
    pub category: String,
    pub kind: EventKind,
    pub actor: Actor,
    /// Rule-specific fields (victim, weapon, item, price, ...)
    pub attributes: BTreeMap<String, AttrValue>,
    pub location: Option<Location>,
    /// The raw line, kept verbatim for diagnostics
    pub raw_line: String,
}

impl Event {
    /// Text attribute lookup shorthand.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttrValue::as_text)
    }
}
