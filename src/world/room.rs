//! Per-room environmental state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::types::{RoomId, Variable};

/// Variable values for one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomState {
    pub id: RoomId,
    pub values: BTreeMap<Variable, f64>,
}

impl RoomState {
    /// A room at comfortable defaults: 22°C, 300 lm, 35 dB, 45 %RH, mood 0.8
    pub fn new(id: RoomId) -> Self {
        let values = BTreeMap::from([
            (Variable::Temperature, 22.0),
            (Variable::Lumens, 300.0),
            (Variable::Noise, 35.0),
            (Variable::Humidity, 45.0),
            (Variable::MoodScore, 0.8),
        ]);
        Self { id, values }
    }

    pub fn get(&self, variable: Variable) -> f64 {
        self.values.get(&variable).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, variable: Variable, value: f64) {
        self.values.insert(variable, value);
    }

    /// Add `delta` and return the new value
    pub fn adjust(&mut self, variable: Variable, delta: f64) -> f64 {
        let value = self.get(variable) + delta;
        self.set(variable, value);
        value
    }

    pub fn with(mut self, variable: Variable, value: f64) -> Self {
        self.set(variable, value);
        self
    }
}

/// Inclusive numeric band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}
