//! Declarative rule conditions
//!
//! A predicate is a conjunction of named conditions, written in rule packs as a
//! table such as `{ temperature_gt = 25.0, room_tag = "sleep" }`. Keys are
//! parsed into a closed set of variants up front; a key that is not
//! recognised, or whose value has the wrong shape, becomes
//! [`Condition::Unknown`]. Unknown conditions hold vacuously and are reported
//! back to the caller so it can warn.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::calendar::{Season, TimeWindow};
use crate::core::types::{RoomId, Variable};
use crate::world::device::DeviceKind;
use crate::world::room::RoomState;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Simulated hour of day falls inside the window
    TimeBetween(TimeWindow),
    /// Room carries any of the tags
    RoomTag(Vec<String>),
    /// Current season is any of these
    Season(Vec<Season>),
    /// Room variable strictly above a threshold
    Above(Variable, f64),
    /// Room variable strictly below a threshold
    Below(Variable, f64),
    /// Device kind is any of these names
    DeviceType(Vec<String>),
    /// Household emergency flag equals this value
    Emergency(bool),
    Unknown { key: String, reason: String },
}

impl Condition {
    /// Parse one `key = value` entry
    pub fn parse(key: &str, value: &Value) -> Condition {
        let unknown = |reason: &str| Condition::Unknown {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if let Some((variable, above)) = threshold_key(key) {
            return match value.as_f64() {
                Some(threshold) if above => Condition::Above(variable, threshold),
                Some(threshold) => Condition::Below(variable, threshold),
                None => unknown("expected a number"),
            };
        }

        match key {
            "time_between" => match value {
                Value::String(text) => TimeWindow::parse(text)
                    .map(Condition::TimeBetween)
                    .unwrap_or_else(|| unknown("expected \"HH:MM-HH:MM\"")),
                Value::Array(items) if items.len() == 2 => {
                    match (items[0].as_f64(), items[1].as_f64()) {
                        (Some(start), Some(end)) => {
                            Condition::TimeBetween(TimeWindow::new(start, end))
                        }
                        _ => unknown("expected [start_hour, end_hour]"),
                    }
                }
                _ => unknown("expected a time window"),
            },
            "room_tag" => string_list(value)
                .map(Condition::RoomTag)
                .unwrap_or_else(|| unknown("expected a tag or list of tags")),
            "season" => string_list(value)
                .and_then(|names| names.iter().map(|n| Season::parse(n)).collect())
                .map(Condition::Season)
                .unwrap_or_else(|| unknown("expected a season or list of seasons")),
            "device_type" => string_list(value)
                .map(Condition::DeviceType)
                .unwrap_or_else(|| unknown("expected a device type or list")),
            "emergency" => value
                .as_bool()
                .map(Condition::Emergency)
                .unwrap_or_else(|| unknown("expected a boolean")),
            _ => unknown("unrecognized predicate key"),
        }
    }

    pub fn key(&self) -> String {
        match self {
            Condition::TimeBetween(_) => "time_between".into(),
            Condition::RoomTag(_) => "room_tag".into(),
            Condition::Season(_) => "season".into(),
            Condition::Above(v, _) => format!("{}_gt", v.as_str()),
            Condition::Below(v, _) => format!("{}_lt", v.as_str()),
            Condition::DeviceType(_) => "device_type".into(),
            Condition::Emergency(_) => "emergency".into(),
            Condition::Unknown { key, .. } => key.clone(),
        }
    }

    fn holds(&self, ctx: &PredicateContext) -> bool {
        match self {
            Condition::TimeBetween(window) => window.contains(ctx.hour),
            Condition::RoomTag(tags) => ctx
                .candidate_rooms()
                .any(|room| tags.iter().any(|t| room.id.has_tag(t))),
            Condition::Season(seasons) => seasons.contains(&ctx.season),
            Condition::Above(variable, threshold) => ctx
                .candidate_rooms()
                .any(|room| room.get(*variable) > *threshold),
            Condition::Below(variable, threshold) => ctx
                .candidate_rooms()
                .any(|room| room.get(*variable) < *threshold),
            Condition::DeviceType(kinds) => ctx
                .device_kind
                .is_some_and(|kind| kinds.iter().any(|k| k == kind.as_str())),
            Condition::Emergency(expected) => ctx.emergency == *expected,
            Condition::Unknown { .. } => true,
        }
    }
}

/// `temperature_gt` -> (Temperature, true); `mood_lt` -> (MoodScore, false)
fn threshold_key(key: &str) -> Option<(Variable, bool)> {
    let (name, above) = if let Some(name) = key.strip_suffix("_gt") {
        (name, true)
    } else if let Some(name) = key.strip_suffix("_lt") {
        (name, false)
    } else {
        return None;
    };
    let variable = match name {
        "mood" => Variable::MoodScore,
        other => Variable::parse(other)?,
    };
    Some((variable, above))
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// A conjunction of conditions; the empty predicate always holds
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct Pred {
    pub conditions: Vec<Condition>,
}

impl From<BTreeMap<String, Value>> for Pred {
    fn from(table: BTreeMap<String, Value>) -> Self {
        let conditions = table
            .iter()
            .map(|(key, value)| Condition::parse(key, value))
            .collect();
        Self { conditions }
    }
}

impl Pred {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// Evaluate, stopping at the first failing condition
    ///
    /// Unknown conditions encountered before that point are pushed onto
    /// `unknown` and treated as satisfied.
    pub fn evaluate(&self, ctx: &PredicateContext, unknown: &mut Vec<String>) -> bool {
        for condition in &self.conditions {
            if let Condition::Unknown { key, reason } = condition {
                unknown.push(format!("{} ({})", key, reason));
                continue;
            }
            if !condition.holds(ctx) {
                return false;
            }
        }
        true
    }

    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().filter_map(|c| match c {
            Condition::Unknown { key, .. } => Some(key.as_str()),
            _ => None,
        })
    }
}

/// What a predicate is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct PredicateContext<'a> {
    pub hour: f64,
    pub season: Season,
    pub emergency: bool,
    /// The room in scope; world-scope evaluation leaves this empty and
    /// room conditions then hold if any room satisfies them
    pub room: Option<&'a RoomState>,
    pub rooms: &'a BTreeMap<RoomId, RoomState>,
    pub device_kind: Option<DeviceKind>,
}

impl<'a> PredicateContext<'a> {
    fn candidate_rooms(&self) -> Box<dyn Iterator<Item = &'a RoomState> + 'a> {
        match self.room {
            Some(room) => Box::new(std::iter::once(room)),
            None => Box::new(self.rooms.values()),
        }
    }
}
