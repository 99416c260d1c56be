//! Device runtime records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actions::catalog::ActionKind;
use crate::core::types::{DeviceId, RoomId, Tick};

/// Device classes known to the household
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Thermostat,
    Heater,
    AirConditioner,
    Light,
    Speaker,
    Humidifier,
    Dehumidifier,
    HealthMonitor,
    Assistant,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 9] = [
        DeviceKind::Thermostat,
        DeviceKind::Heater,
        DeviceKind::AirConditioner,
        DeviceKind::Light,
        DeviceKind::Speaker,
        DeviceKind::Humidifier,
        DeviceKind::Dehumidifier,
        DeviceKind::HealthMonitor,
        DeviceKind::Assistant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Thermostat => "thermostat",
            DeviceKind::Heater => "heater",
            DeviceKind::AirConditioner => "air_conditioner",
            DeviceKind::Light => "light",
            DeviceKind::Speaker => "speaker",
            DeviceKind::Humidifier => "humidifier",
            DeviceKind::Dehumidifier => "dehumidifier",
            DeviceKind::HealthMonitor => "health_monitor",
            DeviceKind::Assistant => "assistant",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Thermal actuators get a minimum dwell between temperature toggles
    pub fn is_thermal(&self) -> bool {
        matches!(
            self,
            DeviceKind::Thermostat | DeviceKind::Heater | DeviceKind::AirConditioner
        )
    }

    /// Starting goal mix for a freshly joined device
    pub fn default_goals(&self) -> Vec<Goal> {
        let pairs: &[(&str, f64)] = match self {
            DeviceKind::Thermostat => &[("comfort", 0.6), ("energy_saving", 0.4)],
            DeviceKind::Heater => &[("warmth", 0.8), ("comfort", 0.2)],
            DeviceKind::AirConditioner => &[("cooling", 0.7), ("comfort", 0.3)],
            DeviceKind::Light => &[("brightness", 0.5), ("comfort", 0.3), ("energy_saving", 0.2)],
            DeviceKind::Speaker => &[("entertainment", 0.7), ("mood", 0.3)],
            DeviceKind::Humidifier => &[("comfort", 0.6), ("health", 0.4)],
            DeviceKind::Dehumidifier => &[("health", 0.6), ("energy_saving", 0.4)],
            DeviceKind::HealthMonitor => &[("health", 0.6), ("safety", 0.4)],
            DeviceKind::Assistant => &[("mood", 0.5), ("sleep", 0.3), ("comfort", 0.2)],
        };
        pairs.iter().map(|(name, weight)| Goal::new(*name, *weight)).collect()
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A weighted objective; a device's weights are expected to sum to 1.0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub name: String,
    pub weight: f64,
}

impl Goal {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Idle,
    Acting,
    Conflict,
    Safe,
}

/// Runtime record for a device that has joined the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRuntime {
    pub id: DeviceId,
    pub kind: DeviceKind,
    pub room: RoomId,
    pub goals: Vec<Goal>,
    /// Communication/personality traits, opaque to mediation
    #[serde(default)]
    pub personality: BTreeMap<String, String>,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub last_action: Option<ActionKind>,
    #[serde(default)]
    pub joined_tick: Tick,
}

impl DeviceRuntime {
    pub fn new(id: impl Into<DeviceId>, kind: DeviceKind, room: RoomId) -> Self {
        Self {
            id: id.into(),
            kind,
            room,
            goals: kind.default_goals(),
            personality: BTreeMap::new(),
            status: DeviceStatus::Idle,
            last_action: None,
            joined_tick: 0,
        }
    }

    pub fn with_goals(mut self, goals: Vec<Goal>) -> Self {
        self.goals = goals;
        self
    }

    pub fn with_trait(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.personality.insert(key.into(), value.into());
        self
    }

    pub fn goal_weight_sum(&self) -> f64 {
        self.goals.iter().map(|g| g.weight).sum()
    }

    /// Rescale goal weights to sum to 1.0; returns true when anything changed
    ///
    /// Negative weights are zeroed first. A device whose weights are all zero
    /// gets an even split.
    pub fn normalize_goals(&mut self) -> bool {
        if self.goals.is_empty() {
            return false;
        }
        let mut changed = false;
        for goal in &mut self.goals {
            if goal.weight < 0.0 || !goal.weight.is_finite() {
                goal.weight = 0.0;
                changed = true;
            }
        }

        let sum = self.goal_weight_sum();
        if (sum - 1.0).abs() <= 1e-9 {
            return changed;
        }

        let count = self.goals.len() as f64;
        for goal in &mut self.goals {
            goal.weight = if sum > 0.0 { goal.weight / sum } else { 1.0 / count };
        }
        true
    }
}
