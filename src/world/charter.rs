//! Household charter: per-room target values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::core::error::Result;
use crate::core::types::{RoomId, Variable};

/// Target values consumed only by divergence analytics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Charter {
    #[serde(default)]
    pub targets: BTreeMap<RoomId, BTreeMap<Variable, f64>>,
}

impl Charter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, room: RoomId, variable: Variable, value: f64) -> Self {
        self.targets.entry(room).or_default().insert(variable, value);
        self
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// All (room, variable, target) triples in stable order
    pub fn entries(&self) -> impl Iterator<Item = (RoomId, Variable, f64)> + '_ {
        self.targets
            .iter()
            .flat_map(|(room, vars)| vars.iter().map(move |(var, target)| (*room, *var, *target)))
    }

    pub fn is_empty(&self) -> bool {
        self.targets.values().all(BTreeMap::is_empty)
    }
}
