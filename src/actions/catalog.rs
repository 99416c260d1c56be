//! Action definitions and catalog

use serde::{Deserialize, Serialize};

use crate::core::types::Variable;

/// Every action a device may propose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Cool,
    Heat,
    Brighten,
    Dim,
    /// Monitor alert: lights drop to a steady low guide level
    Alert,
    PlayMusic,
    Quiet,
    Humidify,
    Dehumidify,
    Soothe,
    Nag,
}

/// Policy categories, ranked by the household priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Safety,
    Health,
    Comfort,
    Efficiency,
    Entertainment,
}

impl ActionCategory {
    /// Default priority order, safety first
    pub const DEFAULT_ORDER: [ActionCategory; 5] = [
        ActionCategory::Safety,
        ActionCategory::Health,
        ActionCategory::Comfort,
        ActionCategory::Efficiency,
        ActionCategory::Entertainment,
    ];
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Cool,
        ActionKind::Heat,
        ActionKind::Brighten,
        ActionKind::Dim,
        ActionKind::Alert,
        ActionKind::PlayMusic,
        ActionKind::Quiet,
        ActionKind::Humidify,
        ActionKind::Dehumidify,
        ActionKind::Soothe,
        ActionKind::Nag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Cool => "cool",
            ActionKind::Heat => "heat",
            ActionKind::Brighten => "brighten",
            ActionKind::Dim => "dim",
            ActionKind::Alert => "alert",
            ActionKind::PlayMusic => "play_music",
            ActionKind::Quiet => "quiet",
            ActionKind::Humidify => "humidify",
            ActionKind::Dehumidify => "dehumidify",
            ActionKind::Soothe => "soothe",
            ActionKind::Nag => "nag",
        }
    }

    /// Resolve a proposed action name, including the aliases planners use
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        let canonical = match normalized.as_str() {
            "illuminate" | "lights_on" => "brighten",
            "lights_off" | "darken" => "dim",
            "mute" | "silence" => "quiet",
            "music" => "play_music",
            "warm" => "heat",
            "chill" | "air_condition" => "cool",
            "calm" | "cheer" => "soothe",
            "remind" => "nag",
            other => other,
        };
        Self::ALL.into_iter().find(|k| k.as_str() == canonical)
    }

    /// The room variable this action moves
    pub fn variable(&self) -> Variable {
        match self {
            ActionKind::Cool | ActionKind::Heat => Variable::Temperature,
            ActionKind::Brighten | ActionKind::Dim | ActionKind::Alert => Variable::Lumens,
            ActionKind::PlayMusic | ActionKind::Quiet => Variable::Noise,
            ActionKind::Humidify | ActionKind::Dehumidify => Variable::Humidity,
            ActionKind::Soothe | ActionKind::Nag => Variable::MoodScore,
        }
    }

    /// Signed delta applied when the proposal declares none
    pub fn default_delta(&self) -> f64 {
        match self {
            ActionKind::Cool => -1.0,
            ActionKind::Heat => 1.0,
            ActionKind::Brighten => 150.0,
            ActionKind::Dim => -150.0,
            ActionKind::Alert => -100.0,
            ActionKind::PlayMusic => 10.0,
            ActionKind::Quiet => -10.0,
            ActionKind::Humidify => 5.0,
            ActionKind::Dehumidify => -5.0,
            ActionKind::Soothe => 0.1,
            ActionKind::Nag => -0.05,
        }
    }

    /// Declared power demand as a fraction of household capacity
    pub fn default_power(&self) -> f64 {
        match self {
            ActionKind::Cool => 0.6,
            ActionKind::Heat => 0.7,
            ActionKind::Brighten => 0.15,
            ActionKind::Dim => 0.05,
            ActionKind::Alert => 0.1,
            ActionKind::PlayMusic => 0.2,
            ActionKind::Quiet => 0.05,
            ActionKind::Humidify => 0.3,
            ActionKind::Dehumidify => 0.45,
            ActionKind::Soothe => 0.05,
            ActionKind::Nag => 0.02,
        }
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            ActionKind::Alert | ActionKind::Dehumidify | ActionKind::Soothe => {
                ActionCategory::Health
            }
            ActionKind::Cool
            | ActionKind::Heat
            | ActionKind::Brighten
            | ActionKind::Quiet
            | ActionKind::Humidify => ActionCategory::Comfort,
            ActionKind::Dim | ActionKind::Nag => ActionCategory::Efficiency,
            ActionKind::PlayMusic => ActionCategory::Entertainment,
        }
    }

    /// Named opposing actions on the same variable
    pub fn opposes(&self, other: ActionKind) -> bool {
        use ActionKind::*;
        matches!(
            (self, other),
            (Cool, Heat)
                | (Heat, Cool)
                | (Brighten, Dim)
                | (Dim, Brighten)
                | (Brighten, Alert)
                | (Alert, Brighten)
                | (PlayMusic, Quiet)
                | (Quiet, PlayMusic)
                | (Humidify, Dehumidify)
                | (Dehumidify, Humidify)
                | (Soothe, Nag)
                | (Nag, Soothe)
        )
    }

    /// The action moving the same variable in the direction of `delta`
    pub fn for_delta(variable: Variable, delta: f64) -> ActionKind {
        let up = delta >= 0.0;
        match (variable, up) {
            (Variable::Temperature, true) => ActionKind::Heat,
            (Variable::Temperature, false) => ActionKind::Cool,
            (Variable::Lumens, true) => ActionKind::Brighten,
            (Variable::Lumens, false) => ActionKind::Dim,
            (Variable::Noise, true) => ActionKind::PlayMusic,
            (Variable::Noise, false) => ActionKind::Quiet,
            (Variable::Humidity, true) => ActionKind::Humidify,
            (Variable::Humidity, false) => ActionKind::Dehumidify,
            (Variable::MoodScore, true) => ActionKind::Soothe,
            (Variable::MoodScore, false) => ActionKind::Nag,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
