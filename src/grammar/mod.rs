//! Line grammars: ordered pattern tables producing typed events
//!
//! A grammar is configuration, not engine code: each category declares an
//! ordered list of rules (most specific first), and one generic matcher turns
//! a raw line into an [`Event`]. Regexes are compiled and validated once at
//! startup, never per line.
//!
//! Capture-group conventions shared by every rule:
//! - `ts` (required): event timestamp, `YYYY.MM.DD-HH.MM.SS`
//! - `name`, `player_id`, `steam_id`: the actor
//! - `x`, `y`, `z`: a world location (all three or none)
//! - any other named group becomes an attribute; groups listed in
//!   `numeric_fields` are parsed as numbers

pub mod categories;
pub mod event;

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::warn;

use crate::error::RelayError;

pub use categories::{builtin_categories, builtin_rules};
pub use event::{Actor, AttrValue, Event, EventKind, Location};

/// Timestamp format the game server writes at the start of every line.
const LINE_TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

const ACTOR_GROUPS: [&str; 3] = ["name", "player_id", "steam_id"];
const LOCATION_GROUPS: [&str; 3] = ["x", "y", "z"];

/// A single line-matching rule, declared as static configuration.
#[derive(Debug, Clone, Copy)]
pub struct GrammarRule {
    pub kind: EventKind,
    pub pattern: &'static str,
    /// Named groups to parse as numbers instead of text
    pub numeric_fields: &'static [&'static str],
}

struct CompiledRule {
    kind: EventKind,
    regex: Regex,
    numeric_fields: HashSet<&'static str>,
}

/// An ordered, compiled set of rules for one category.
///
/// Rule order is significant: the first matching pattern wins, so specific
/// patterns must precede generic fallbacks.
pub struct Grammar {
    category: String,
    rules: Vec<CompiledRule>,
}

impl Grammar {
    /// Compile a rule table, validating every regex up front.
    pub fn compile(category: &str, rules: &[GrammarRule]) -> Result<Self, RelayError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (idx, rule) in rules.iter().enumerate() {
            let regex = Regex::new(rule.pattern).map_err(|e| RelayError::Grammar {
                category: category.to_string(),
                reason: format!("rule[{idx}] ({:?}): {e}", rule.kind),
            })?;
            compiled.push(CompiledRule {
                kind: rule.kind,
                regex,
                numeric_fields: rule.numeric_fields.iter().copied().collect(),
            });
        }
        Ok(Self {
            category: category.to_string(),
            rules: compiled,
        })
    }

    /// Compile the built-in grammar for a category name.
    pub fn builtin(category: &str) -> Result<Self, RelayError> {
        let rules = builtin_rules(category).ok_or_else(|| RelayError::Grammar {
            category: category.to_string(),
            reason: "no built-in grammar for this category".to_string(),
        })?;
        Self::compile(category, rules)
    }

    /// Parse one raw line into an event.
    ///
    /// Returns `None` both for lines no rule matches (expected: most lines
    /// are noise) and for matched lines whose fields fail conversion; the
    /// latter is logged with the offending line so the grammar can be fixed.
    pub fn parse_line(&self, raw: &str) -> Option<Event> {
        for rule in &self.rules {
            if let Some(captures) = rule.regex.captures(raw) {
                return match self.build_event(rule, &captures, raw) {
                    Ok(event) => Some(event),
                    Err(reason) => {
                        warn!(
                            "Dropping malformed '{}' line ({}): {}",
                            self.category, reason, raw
                        );
                        None
                    }
                };
            }
        }
        None
    }

    fn build_event(
        &self,
        rule: &CompiledRule,
        captures: &regex::Captures<'_>,
        raw: &str,
    ) -> Result<Event, String> {
        let ts_text = captures
            .name("ts")
            .map(|m| m.as_str())
            .ok_or("missing 'ts' capture")?;
        let timestamp = NaiveDateTime::parse_from_str(ts_text, LINE_TIMESTAMP_FORMAT)
            .map_err(|e| format!("bad timestamp '{ts_text}': {e}"))?;

        let actor = Actor {
            name: captures
                .name("name")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            player_id: captures.name("player_id").map(|m| m.as_str().to_string()),
            steam_id: captures.name("steam_id").map(|m| m.as_str().to_string()),
        };

        let location = match (
            captures.name("x"),
            captures.name("y"),
            captures.name("z"),
        ) {
            (Some(x), Some(y), Some(z)) => Some(Location {
                x: parse_number("x", x.as_str())?,
                y: parse_number("y", y.as_str())?,
                z: parse_number("z", z.as_str())?,
            }),
            _ => None,
        };

        let mut attributes = BTreeMap::new();
        for group_name in rule.regex.capture_names().flatten() {
            if group_name == "ts"
                || ACTOR_GROUPS.contains(&group_name)
                || LOCATION_GROUPS.contains(&group_name)
            {
                continue;
            }
            let Some(m) = captures.name(group_name) else {
                continue; // optional group that did not participate
            };
            let value = if rule.numeric_fields.contains(group_name) {
                AttrValue::Number(parse_number(group_name, m.as_str())?)
            } else {
                AttrValue::Text(m.as_str().to_string())
            };
            attributes.insert(group_name.to_string(), value);
        }

        Ok(Event {
            timestamp,
            category: self.category.clone(),
            kind: rule.kind,
            actor,
            attributes,
            location,
            raw_line: raw.to_string(),
        })
    }
}

fn parse_number(field: &str, text: &str) -> Result<f64, String> {
    let value: f64 = text
        .parse()
        .map_err(|_| format!("field '{field}' is not numeric: '{text}'"))?;
    if !value.is_finite() {
        return Err(format!("field '{field}' is not finite: '{text}'"));
    }
    Ok(value)
}
