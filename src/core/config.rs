//! Simulation configuration with documented constants
//!
//! All tunables live here. Values are plain data and can be loaded from a
//! TOML file; anything omitted falls back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::calendar::Calendar;
use crate::core::error::{HearthError, Result};

/// Configuration for the simulation core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    // === TIME ===
    /// Simulated seconds per tick
    pub tick_seconds: u64,

    /// Hour of day at tick 0
    pub start_hour: f64,

    /// Zero-based day of year at tick 0 (drives `season` predicates)
    pub start_day_of_year: u32,

    // === LOGS ===
    /// Event log capacity; oldest events are evicted first
    pub event_log_cap: usize,

    /// Divergence ring buffer capacity
    pub divergence_cap: usize,

    /// Causal link buffer capacity
    pub causal_cap: usize,

    /// How far back (in ticks) an applied action can be blamed for a rule firing
    pub causal_window_ticks: u64,

    // === HYSTERESIS ===
    /// Minimum ticks between toggles for thermal actuators acting on temperature
    pub thermal_min_toggle_ticks: u32,

    /// Cooldown issued when a delta is clamped by a rate constraint
    pub rate_clamp_cooldown_ticks: u32,

    // === MEDIATION ===
    /// Utility bonus per rank in the policy priority order
    ///
    /// With five categories and a step of 0.1, safety actions get +0.5 and
    /// entertainment actions +0.1.
    pub priority_bonus_step: f64,

    /// Penalty applied to an action whose projected value leaves the safety band
    ///
    /// Large enough to dominate goal alignment, so a contender that would
    /// breach a bound loses to any contender that would not.
    pub projected_violation_penalty: f64,

    // === HEALTH ===
    pub health: HealthThresholds,

    // === DIRECTOR ===
    pub director: DirectorConfig,

    // === RUNTIME ===
    /// Wall-clock milliseconds between ticks when driven by the async runtime
    pub tick_interval_ms: u64,

    /// Capacity of the proposal inbox between planner tasks and the tick task
    pub inbox_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 10,
            start_hour: 8.0,
            start_day_of_year: 171,

            event_log_cap: 1000,
            divergence_cap: 100,
            causal_cap: 100,
            causal_window_ticks: 6,

            thermal_min_toggle_ticks: 3,
            rate_clamp_cooldown_ticks: 1,

            priority_bonus_step: 0.1,
            projected_violation_penalty: 5.0,

            health: HealthThresholds::default(),
            director: DirectorConfig::default(),

            tick_interval_ms: 1000,
            inbox_capacity: 64,
        }
    }
}

/// Comfort and safety thresholds used by the harmony score
///
/// A value outside its comfort range costs a mild multiplicative penalty;
/// outside the safety range the penalty is severe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub temperature_comfort: (f64, f64),
    pub temperature_safe: (f64, f64),
    /// Upper lumens bound during quiet hours
    pub lumens_night_max: f64,
    pub lumens_max: f64,
    pub noise_comfort_max: f64,
    pub noise_quiet_hours_max: f64,
    pub noise_safe_max: f64,
    pub humidity_comfort: (f64, f64),
    pub humidity_safe: (f64, f64),
    pub comfort_penalty: f64,
    pub safety_penalty: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            temperature_comfort: (19.0, 24.0),
            temperature_safe: (16.0, 26.0),
            lumens_night_max: 300.0,
            lumens_max: 1200.0,
            noise_comfort_max: 60.0,
            noise_quiet_hours_max: 40.0,
            noise_safe_max: 85.0,
            humidity_comfort: (30.0, 60.0),
            humidity_safe: (20.0, 70.0),
            comfort_penalty: 0.85,
            safety_penalty: 0.5,
        }
    }
}

/// Pacing settings for the director
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    pub enabled: bool,
    /// Below this many conflicts per simulated day, the day counts as calm
    pub min_conflicts_per_day: u32,
    /// Above this many conflicts per simulated day, the day is over budget
    pub max_conflicts_per_day: u32,
    pub max_synergies_per_day: u32,
    /// Ticks between forced events
    pub forced_event_cooldown_ticks: u64,
    /// Chance per eligible tick that a forced event is injected
    pub forced_event_chance: f64,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_conflicts_per_day: 2,
            max_conflicts_per_day: 40,
            max_synergies_per_day: 40,
            forced_event_cooldown_ticks: 360,
            forced_event_chance: 0.01,
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file, then validate
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate().map_err(HearthError::InvalidConfig)?;
        Ok(config)
    }

    pub fn calendar(&self) -> Calendar {
        Calendar::new(self.start_hour, self.start_day_of_year)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.tick_seconds == 0 {
            return Err("tick_seconds must be positive".into());
        }

        if !(0.0..24.0).contains(&self.start_hour) {
            return Err(format!("start_hour ({}) must be in [0, 24)", self.start_hour));
        }

        if self.event_log_cap == 0 || self.divergence_cap == 0 || self.causal_cap == 0 {
            return Err("log capacities must be positive".into());
        }

        let h = &self.health;
        if h.temperature_comfort.0 >= h.temperature_comfort.1
            || h.temperature_safe.0 >= h.temperature_safe.1
        {
            return Err("temperature ranges must be ordered (low, high)".into());
        }
        if h.humidity_comfort.0 >= h.humidity_comfort.1 || h.humidity_safe.0 >= h.humidity_safe.1 {
            return Err("humidity ranges must be ordered (low, high)".into());
        }
        if !(0.0..=1.0).contains(&h.comfort_penalty) || !(0.0..=1.0).contains(&h.safety_penalty) {
            return Err("health penalties must be multipliers in [0, 1]".into());
        }

        let d = &self.director;
        if d.min_conflicts_per_day > d.max_conflicts_per_day {
            return Err(format!(
                "director min_conflicts_per_day ({}) exceeds max_conflicts_per_day ({})",
                d.min_conflicts_per_day, d.max_conflicts_per_day
            ));
        }
        if !(0.0..=1.0).contains(&d.forced_event_chance) {
            return Err("director forced_event_chance must be a probability".into());
        }

        if self.tick_interval_ms == 0 || self.inbox_capacity == 0 {
            return Err("runtime interval and inbox capacity must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml(
            r#"
            tick_seconds = 30
            [director]
            enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.tick_seconds, 30);
        assert!(config.director.enabled);
        assert_eq!(config.event_log_cap, 1000);
        assert_eq!(config.director.max_conflicts_per_day, 40);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = SimulationConfig::from_toml("tick_seconds = 0");
        assert!(matches!(result, Err(HearthError::InvalidConfig(_))));

        let mut config = SimulationConfig::default();
        config.health.temperature_safe = (30.0, 20.0);
        assert!(config.validate().is_err());
    }
}
