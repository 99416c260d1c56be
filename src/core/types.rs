//! Core type definitions used throughout the codebase

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Simulation tick counter
pub type Tick = u64;

/// Unique identifier for a device
///
/// Ordered lexicographically; the ordering is what mediation uses to break
/// utility ties, so it must stay a plain string comparison.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Rooms of the household
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomId {
    LivingRoom,
    Kitchen,
    Bedroom,
    Bathroom,
    Office,
}

impl RoomId {
    pub const ALL: [RoomId; 5] = [
        RoomId::LivingRoom,
        RoomId::Kitchen,
        RoomId::Bedroom,
        RoomId::Bathroom,
        RoomId::Office,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomId::LivingRoom => "living_room",
            RoomId::Kitchen => "kitchen",
            RoomId::Bedroom => "bedroom",
            RoomId::Bathroom => "bathroom",
            RoomId::Office => "office",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == name)
    }

    /// Descriptive tags matched by `room_tag` predicates
    pub fn tags(&self) -> &'static [&'static str] {
        match self {
            RoomId::LivingRoom => &["common", "social"],
            RoomId::Kitchen => &["common", "cooking", "wet"],
            RoomId::Bedroom => &["sleep", "private", "quiet"],
            RoomId::Bathroom => &["wet", "private"],
            RoomId::Office => &["work", "quiet"],
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags().contains(&tag) || self.as_str() == tag
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environmental variables tracked per room
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Degrees Celsius
    Temperature,
    Lumens,
    /// Decibels
    Noise,
    /// Relative humidity, percent
    Humidity,
    /// 0.0 (miserable) to 1.0 (content)
    MoodScore,
}

impl Variable {
    pub const ALL: [Variable; 5] = [
        Variable::Temperature,
        Variable::Lumens,
        Variable::Noise,
        Variable::Humidity,
        Variable::MoodScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::Lumens => "lumens",
            Variable::Noise => "noise",
            Variable::Humidity => "humidity",
            Variable::MoodScore => "mood_score",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == name)
    }

    /// Typical magnitude of the variable, used to normalise divergence
    pub fn scale(&self) -> f64 {
        match self {
            Variable::Temperature => 10.0,
            Variable::Lumens => 500.0,
            Variable::Noise => 40.0,
            Variable::Humidity => 30.0,
            Variable::MoodScore => 1.0,
        }
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_orders_lexicographically() {
        let a = DeviceId::from("ac-1");
        let b = DeviceId::from("heater-1");
        assert!(a < b);
        assert_eq!(a.to_string(), "ac-1");
    }

    #[test]
    fn test_room_round_trip_names() {
        for room in RoomId::ALL {
            assert_eq!(RoomId::parse(room.as_str()), Some(room));
        }
        assert_eq!(RoomId::parse("attic"), None);
    }

    #[test]
    fn test_room_tags() {
        assert!(RoomId::Bedroom.has_tag("sleep"));
        assert!(RoomId::Bedroom.has_tag("bedroom"));
        assert!(!RoomId::Kitchen.has_tag("sleep"));
    }

    #[test]
    fn test_variable_serde_names() {
        let json = serde_json::to_string(&Variable::MoodScore).unwrap();
        assert_eq!(json, "\"mood_score\"");
        assert_eq!(Variable::parse("lumens"), Some(Variable::Lumens));
    }
}
