//! Built-in category grammars
//!
//! Declarative rule tables for the log categories the game server produces.
//! These are data, not code: adding a category means adding a table here and
//! a `[[relay.categories]]` entry to the config. Order inside each table
//! matters: specific rules first.

use super::{EventKind, GrammarRule};

const KILLS: &[GrammarRule] = &[
    GrammarRule {
        kind: EventKind::PlayerKill,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): (?P<name>.+?) \((?P<steam_id>\d+)\) killed (?P<victim>.+?) \((?P<victim_steam_id>\d+)\) with (?P<weapon>.+?) from (?P<distance>\d+(?:\.\d+)?)m at X=(?P<x>-?\d+(?:\.\d+)?) Y=(?P<y>-?\d+(?:\.\d+)?) Z=(?P<z>-?\d+(?:\.\d+)?)$",
        numeric_fields: &["distance"],
    },
    GrammarRule {
        kind: EventKind::PlayerKill,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): (?P<name>.+?) \((?P<steam_id>\d+)\) killed (?P<victim>.+?) \((?P<victim_steam_id>\d+)\) with (?P<weapon>.+)$",
        numeric_fields: &[],
    },
    GrammarRule {
        kind: EventKind::Suicide,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): (?P<name>.+?) \((?P<steam_id>\d+)\) committed suicide$",
        numeric_fields: &[],
    },
];

const LOGINS: &[GrammarRule] = &[
    GrammarRule {
        kind: EventKind::Login,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): '(?P<ip>[\d.]+) (?P<steam_id>\d+):(?P<name>.+?)\((?P<player_id>\d+)\)' logged in at: X=(?P<x>-?\d+(?:\.\d+)?) Y=(?P<y>-?\d+(?:\.\d+)?) Z=(?P<z>-?\d+(?:\.\d+)?)$",
        numeric_fields: &[],
    },
    GrammarRule {
        kind: EventKind::Logout,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): '(?P<ip>[\d.]+) (?P<steam_id>\d+):(?P<name>.+?)\((?P<player_id>\d+)\)' logged out at: X=(?P<x>-?\d+(?:\.\d+)?) Y=(?P<y>-?\d+(?:\.\d+)?) Z=(?P<z>-?\d+(?:\.\d+)?)$",
        numeric_fields: &[],
    },
];

const CHAT: &[GrammarRule] = &[GrammarRule {
    kind: EventKind::ChatMessage,
    pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): '(?P<steam_id>\d+):(?P<name>.+?)\((?P<player_id>\d+)\)' '(?P<channel>Local|Global|Squad|Admin)': '(?P<message>.*)'$",
    numeric_fields: &[],
}];

const ECONOMY: &[GrammarRule] = &[
    GrammarRule {
        kind: EventKind::TradePurchase,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): (?P<name>.+?)\((?P<player_id>\d+)\) purchased (?P<item>[A-Za-z0-9_]+) x(?P<quantity>\d+) for (?P<price>\d+(?:\.\d+)?) credits from trader (?P<trader>.+)$",
        numeric_fields: &["quantity", "price"],
    },
    GrammarRule {
        kind: EventKind::TradeSale,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): (?P<name>.+?)\((?P<player_id>\d+)\) sold (?P<item>[A-Za-z0-9_]+) x(?P<quantity>\d+) for (?P<price>\d+(?:\.\d+)?) credits to trader (?P<trader>.+)$",
        numeric_fields: &["quantity", "price"],
    },
];

const ADMIN: &[GrammarRule] = &[GrammarRule {
    kind: EventKind::AdminCommand,
    pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): '(?P<steam_id>\d+):(?P<name>.+?)\((?P<player_id>\d+)\)' command: '(?P<command>.*)'$",
    numeric_fields: &[],
}];

const VIOLATIONS: &[GrammarRule] = &[
    GrammarRule {
        kind: EventKind::ViolationBan,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): (?P<name>.+?) \((?P<steam_id>\d+)\) was banned: (?P<reason>.+)$",
        numeric_fields: &[],
    },
    GrammarRule {
        kind: EventKind::ViolationKick,
        pattern: r"^(?P<ts>\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}): (?P<name>.+?) \((?P<steam_id>\d+)\) was kicked: (?P<reason>.+)$",
        numeric_fields: &[],
    },
];

/// Names of all categories with a built-in grammar.
pub fn builtin_categories() -> &'static [&'static str] {
    &["kills", "logins", "chat", "economy", "admin", "violations"]
}

/// The rule table for a category, if one is built in.
pub fn builtin_rules(category: &str) -> Option<&'static [GrammarRule]> {
    match category {
        "kills" => Some(KILLS),
        "logins" => Some(LOGINS),
        "chat" => Some(CHAT),
        "economy" => Some(ECONOMY),
        "admin" => Some(ADMIN),
        "violations" => Some(VIOLATIONS),
        _ => None,
    }
}
