//! Rolling analytics: household harmony and divergence from the charter

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::core::config::HealthThresholds;
use crate::core::types::{RoomId, Tick, Variable};
use crate::world::room::RoomState;
use crate::world::WorldState;

/// Harmony for one room in `[0, 1]`
///
/// Starts at 1.0, takes a multiplicative penalty per variable outside its
/// comfort band (or a harsher one outside its safety band), then scales by
/// the room's mood.
pub fn room_health(room: &RoomState, thresholds: &HealthThresholds, quiet_hours: bool) -> f64 {
    let comfort = thresholds.comfort_penalty;
    let safety = thresholds.safety_penalty;
    let banded = |value: f64, safe: (f64, f64), comfy: (f64, f64)| {
        if value < safe.0 || value > safe.1 {
            safety
        } else if value < comfy.0 || value > comfy.1 {
            comfort
        } else {
            1.0
        }
    };

    let mut score = 1.0;
    score *= banded(
        room.get(Variable::Temperature),
        thresholds.temperature_safe,
        thresholds.temperature_comfort,
    );
    score *= banded(
        room.get(Variable::Humidity),
        thresholds.humidity_safe,
        thresholds.humidity_comfort,
    );

    let lumens = room.get(Variable::Lumens);
    if lumens > thresholds.lumens_max {
        score *= safety;
    } else if quiet_hours && lumens > thresholds.lumens_night_max {
        score *= comfort;
    }

    let noise = room.get(Variable::Noise);
    let noise_comfort = if quiet_hours {
        thresholds.noise_quiet_hours_max
    } else {
        thresholds.noise_comfort_max
    };
    if noise > thresholds.noise_safe_max {
        score *= safety;
    } else if noise > noise_comfort {
        score *= comfort;
    }

    (score * room.get(Variable::MoodScore).clamp(0.0, 1.0)).clamp(0.0, 1.0)
}

/// Per-room scores and their average; an empty house scores 1.0
pub fn household_health(
    rooms: &BTreeMap<RoomId, RoomState>,
    thresholds: &HealthThresholds,
    quiet_hours: bool,
) -> (f64, BTreeMap<RoomId, f64>) {
    let per_room: BTreeMap<RoomId, f64> = rooms
        .iter()
        .map(|(id, room)| (*id, room_health(room, thresholds, quiet_hours)))
        .collect();
    if per_room.is_empty() {
        return (1.0, per_room);
    }
    let mean = per_room.values().sum::<f64>() / per_room.len() as f64;
    (mean, per_room)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceEntry {
    pub room: RoomId,
    pub variable: Variable,
    pub actual: f64,
    pub target: f64,
    /// `actual - target`
    pub gap: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceSample {
    pub tick: Tick,
    pub entries: Vec<DivergenceEntry>,
    /// Mean of |gap| / variable scale across entries
    pub mean_normalized_gap: f64,
}

/// Compare current values to charter targets; None without a charter
pub fn sample_divergence(state: &WorldState) -> Option<DivergenceSample> {
    let charter = state.charter.as_ref()?;
    let entries: Vec<DivergenceEntry> = charter
        .entries()
        .filter_map(|(room, variable, target)| {
            let actual = state.value(room, variable)?;
            Some(DivergenceEntry {
                room,
                variable,
                actual,
                target,
                gap: actual - target,
            })
        })
        .collect();

    let mean_normalized_gap = if entries.is_empty() {
        0.0
    } else {
        entries
            .iter()
            .map(|e| e.gap.abs() / e.variable.scale())
            .sum::<f64>()
            / entries.len() as f64
    };

    Some(DivergenceSample {
        tick: state.tick,
        entries,
        mean_normalized_gap,
    })
}

/// Append a sample, evicting the oldest past `cap`
pub fn record_divergence(history: &mut VecDeque<DivergenceSample>, sample: DivergenceSample, cap: usize) {
    history.push_back(sample);
    while history.len() > cap {
        history.pop_front();
    }
}
