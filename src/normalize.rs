//! Event normalization
//!
//! Post-processes raw parsed events before delivery: strips formatting that
//! would break or abuse the chat sink, maps internal item IDs to display
//! names, and formats coordinates. Pure functions, no I/O.

use crate::grammar::{AttrValue, Event, Location};

/// Maximum length for player/trader names after sanitization.
const MAX_NAME_LEN: usize = 64;
/// Maximum length for free-text attributes (chat messages, ban reasons).
const MAX_TEXT_LEN: usize = 256;
/// Longest run of one repeated character kept in free text.
const MAX_CHAR_RUN: usize = 3;

/// Attributes that carry free text typed by players.
const FREE_TEXT_ATTRS: [&str; 3] = ["message", "reason", "command"];
/// Attributes that carry names and get the stricter length cap.
const NAME_ATTRS: [&str; 2] = ["victim", "trader"];

/// Apply all normalization steps to a freshly parsed event.
pub fn normalize(mut event: Event) -> Event {
    event.actor.name = sanitize_name(&event.actor.name);

    let keys: Vec<String> = event.attributes.keys().cloned().collect();
    for key in keys {
        let Some(AttrValue::Text(text)) = event.attributes.get(&key) else {
            continue;
        };
        let cleaned = if NAME_ATTRS.contains(&key.as_str()) {
            sanitize_name(text)
        } else if FREE_TEXT_ATTRS.contains(&key.as_str()) {
            sanitize_text(text, MAX_TEXT_LEN)
        } else if key == "item" {
            item_display_name(text).to_string()
        } else {
            continue;
        };
        event.attributes.insert(key, AttrValue::Text(cleaned));
    }

    event
}

/// Sanitize a player name: Unicode stays, control characters and
/// Markdown-breaking sequences do not.
pub fn sanitize_name(name: &str) -> String {
    sanitize_text(name, MAX_NAME_LEN)
}

fn sanitize_text(text: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut kept = 0usize;
    let mut last: Option<char> = None;
    let mut run = 0usize;

    for ch in text.chars() {
        if ch.is_control() {
            continue;
        }
        if matches!(ch, '*' | '_' | '~' | '`' | '|' | '>' | '@') {
            continue; // Markdown / mention tokens
        }
        if Some(ch) == last {
            run += 1;
            if run >= MAX_CHAR_RUN {
                continue;
            }
        } else {
            last = Some(ch);
            run = 0;
        }
        out.push(ch);
        kept += 1;
        if kept >= max_len {
            break;
        }
    }

    out.trim().to_string()
}

/// Human-readable coordinates, one decimal place.
pub fn format_location(location: &Location) -> String {
    format!(
        "X={:.1} Y={:.1} Z={:.1}",
        location.x, location.y, location.z
    )
}

/// Map an internal item ID to its display name.
///
/// Unknown IDs fall back to the raw ID with the asset prefix stripped, so new
/// game content degrades gracefully instead of hiding events.
pub fn item_display_name(item_id: &str) -> &str {
    match item_id {
        "Weapon_AK47" => "AK-47",
        "Weapon_M9" => "M9 Pistol",
        "Weapon_M16A4" => "M16A4",
        "Weapon_Improvised_Bow" => "Improvised Bow",
        "Weapon_Katana" => "Katana",
        "Cal_762x39" => "7.62x39mm Ammo",
        "Cal_9mm" => "9mm Ammo",
        "Item_Bandage" => "Bandage",
        "Item_Emergency_Ration" => "Emergency Ration",
        "Vehicle_Quad" => "Quad Bike",
        other => other
            .strip_prefix("Weapon_")
            .or_else(|| other.strip_prefix("Item_"))
            .unwrap_or(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, GrammarRule, EventKind};

    fn kill_event(name: &str, victim: &str) -> Event {
        let grammar = Grammar::compile(
            "kills",
            &[GrammarRule {
                kind: EventKind::PlayerKill,
                pattern: r"^(?P<ts>\S+): (?P<name>.+?) killed (?P<victim>.+)$",
                numeric_fields: &[],
            }],
        )
        .unwrap();
        grammar
            .parse_line(&format!("2024.06.01-12.00.00: {name} killed {victim}"))
            .unwrap()
    }

    #[test]
    fn test_markdown_tokens_stripped() {
        assert_eq!(sanitize_name("**bold**name"), "boldname");
        assert_eq!(sanitize_name("evil`code`"), "evilcode");
        assert_eq!(sanitize_name("@everyone"), "everyone");
    }

    #[test]
    fn test_control_characters_stripped() {
        assert_eq!(sanitize_name("Ali\u{0007}ce"), "Alice");
        assert_eq!(sanitize_name("A\tB\nC"), "ABC");
    }

    #[test]
    fn test_unicode_preserved() {
        assert_eq!(sanitize_name("Żółć日本語"), "Żółć日本語");
    }

    #[test]
    fn test_repeated_characters_collapsed() {
        assert_eq!(sanitize_name("aaaaaaa"), "aaa");
        // Runs of three or fewer stay as typed
        assert_eq!(sanitize_name("hiii!!"), "hiii!!");
    }

    #[test]
    fn test_length_cap() {
        let long = "x".repeat(500);
        assert!(sanitize_name(&long).chars().count() <= 64);
    }

    #[test]
    fn test_normalize_cleans_actor_and_victim() {
        let event = normalize(kill_event("**Alice**", "`Bob`"));
        assert_eq!(event.actor.name, "Alice");
        assert_eq!(event.attr("victim"), Some("Bob"));
    }

    #[test]
    fn test_item_lookup() {
        assert_eq!(item_display_name("Weapon_AK47"), "AK-47");
        assert_eq!(item_display_name("Weapon_Slingshot"), "Slingshot");
        assert_eq!(item_display_name("Mystery_Box"), "Mystery_Box");
    }

    #[test]
    fn test_format_location() {
        let loc = Location { x: -51202.44, y: 12644.0, z: 7021.559 };
        assert_eq!(format_location(&loc), "X=-51202.4 Y=12644.0 Z=7021.6");
    }

    #[test]
    fn test_normalize_is_pure() {
        let event = kill_event("Alice", "Bob");
        assert_eq!(normalize(event.clone()), normalize(event));
    }
}
