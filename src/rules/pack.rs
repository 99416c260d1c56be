//! Rule and rule pack definitions

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::core::types::Variable;
use crate::rules::predicate::Pred;

/// Where a rule is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Once per evaluation, against the whole household
    World,
    /// Once per room
    Room,
    /// Once per device
    Device,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::World => "world",
            Scope::Room => "room",
            Scope::Device => "device",
        }
    }
}

/// Operating environment a pack is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Home,
    Hospital,
    Office,
}

/// Consequence of a matched rule
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub target: Option<Variable>,
    pub delta: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Alarm text raised when a hard rule enforces this transform
    pub alarm: Option<String>,
    /// Action name -> signed utility bias
    pub action_hint: BTreeMap<String, f64>,
}

impl Transform {
    /// Add the delta, then clamp into `[min, max]` where given
    pub fn apply(&self, value: f64) -> f64 {
        self.clamp(value + self.delta.unwrap_or(0.0))
    }

    /// Clamp into `[min, max]` without touching the delta
    pub fn clamp(&self, value: f64) -> f64 {
        let mut next = value;
        if let Some(min) = self.min {
            next = next.max(min);
        }
        if let Some(max) = self.max {
            next = next.min(max);
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldRule {
    pub id: String,
    pub scope: Scope,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub hard: bool,
    /// Device-scope rules may be restricted to one device kind
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub when: Option<Pred>,
    #[serde(default)]
    pub unless: Option<Pred>,
    #[serde(default, rename = "if")]
    pub condition: Option<Pred>,
    #[serde(default)]
    pub then: Transform,
    #[serde(default)]
    pub explain: String,
}

impl WorldRule {
    /// Weight a soft hint from this rule carries in utility scoring
    pub fn hint_weight(&self) -> f64 {
        f64::from(self.priority.min(100)) / 100.0
    }

    /// Cache bucket: `<scope>_<device type or "all">`
    pub fn cache_key(&self) -> String {
        let device = match (self.scope, &self.device_type) {
            (Scope::Device, Some(kind)) => kind.as_str(),
            _ => "all",
        };
        format!("{}_{}", self.scope.as_str(), device)
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Pred> {
        [&self.when, &self.unless, &self.condition]
            .into_iter()
            .flatten()
    }
}

fn default_active() -> bool {
    true
}

/// A named, versioned bundle of rules
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RulePack {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub rules: Vec<WorldRule>,
}

impl RulePack {
    pub fn new(id: impl Into<String>, rules: Vec<WorldRule>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            version: String::new(),
            environment: Environment::Home,
            active: true,
            rules,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}
