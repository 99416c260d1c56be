//! Pacing director
//!
//! Tracks how eventful each simulated day is. Conflicts and synergies are
//! counted per day; a day past its conflict or synergy budget is flagged.
//! When enabled, a calm day may receive a forced event (a heat wave, a
//! loud party, ...) picked with the world's seeded RNG, no more often than
//! the configured cooldown allows.

use serde::{Deserialize, Serialize};

use crate::core::calendar::Season;
use crate::core::config::DirectorConfig;
use crate::core::rng::ParkMiller;
use crate::core::types::{RoomId, Tick, Variable};
use crate::world::WorldState;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorState {
    pub day: u64,
    pub conflicts_today: u32,
    pub synergies_today: u32,
    pub over_budget: bool,
    pub last_forced_tick: Option<Tick>,
    pub forced_events: u32,
}

impl DirectorState {
    /// Reset daily counters when the simulated day changes
    pub fn roll_day(&mut self, day: u64) {
        if day != self.day {
            self.day = day;
            self.conflicts_today = 0;
            self.synergies_today = 0;
            self.over_budget = false;
        }
    }

    pub fn note_mediation(&mut self, conflicts: usize, synergies: usize, config: &DirectorConfig) {
        self.conflicts_today = self.conflicts_today.saturating_add(conflicts as u32);
        self.synergies_today = self.synergies_today.saturating_add(synergies as u32);
        if self.conflicts_today > config.max_conflicts_per_day
            || self.synergies_today > config.max_synergies_per_day
        {
            if !self.over_budget {
                tracing::info!(
                    "Day {} over event budget ({} conflicts, {} synergies)",
                    self.day,
                    self.conflicts_today,
                    self.synergies_today
                );
            }
            self.over_budget = true;
        }
    }

    fn cooled_down(&self, now: Tick, cooldown: u64) -> bool {
        self.last_forced_tick
            .map_or(true, |last| now.saturating_sub(last) >= cooldown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedEvent {
    HeatWave,
    LoudParty,
    HumiditySpike,
    Gloom,
}

impl ForcedEvent {
    pub const ALL: [ForcedEvent; 4] = [
        ForcedEvent::HeatWave,
        ForcedEvent::LoudParty,
        ForcedEvent::HumiditySpike,
        ForcedEvent::Gloom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ForcedEvent::HeatWave => "heat_wave",
            ForcedEvent::LoudParty => "loud_party",
            ForcedEvent::HumiditySpike => "humidity_spike",
            ForcedEvent::Gloom => "gloom",
        }
    }

    /// Selection weight; heat waves favour summer, gloom favours winter
    pub fn weight(&self, season: Season) -> f64 {
        match (self, season) {
            (ForcedEvent::HeatWave, Season::Summer) => 3.0,
            (ForcedEvent::Gloom, Season::Winter | Season::Autumn) => 3.0,
            (ForcedEvent::LoudParty, _) => 2.0,
            _ => 1.0,
        }
    }

    /// Room variable changes this event causes
    pub fn effects(&self) -> Vec<(RoomId, Variable, f64)> {
        match self {
            ForcedEvent::HeatWave => RoomId::ALL
                .into_iter()
                .map(|room| (room, Variable::Temperature, 3.0))
                .collect(),
            ForcedEvent::LoudParty => vec![
                (RoomId::LivingRoom, Variable::Noise, 30.0),
                (RoomId::Kitchen, Variable::Noise, 15.0),
            ],
            ForcedEvent::HumiditySpike => vec![
                (RoomId::Bathroom, Variable::Humidity, 20.0),
                (RoomId::Kitchen, Variable::Humidity, 12.0),
            ],
            ForcedEvent::Gloom => RoomId::ALL
                .into_iter()
                .flat_map(|room| {
                    [
                        (room, Variable::MoodScore, -0.2),
                        (room, Variable::Lumens, -100.0),
                    ]
                })
                .collect(),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ForcedEvent::HeatWave => "A heat wave rolls in",
            ForcedEvent::LoudParty => "The neighbours start a loud party",
            ForcedEvent::HumiditySpike => "A long shower fogs up the wet rooms",
            ForcedEvent::Gloom => "Grey skies dampen the household mood",
        }
    }
}

/// Maybe inject a forced event this tick; returns it when one was applied
///
/// Draws from the RNG only once a day is calm and the cooldown has passed,
/// so a disabled director never perturbs the random sequence.
pub fn direct(
    state: &mut WorldState,
    rng: &mut ParkMiller,
    config: &DirectorConfig,
    day: u64,
    season: Season,
) -> Option<ForcedEvent> {
    if !config.enabled {
        return None;
    }
    state.director.roll_day(day);

    let calm = state.director.conflicts_today < config.min_conflicts_per_day;
    if !calm || !state.director.cooled_down(state.tick, config.forced_event_cooldown_ticks) {
        return None;
    }
    if rng.uniform() >= config.forced_event_chance {
        return None;
    }

    let weights: Vec<f64> = ForcedEvent::ALL.iter().map(|e| e.weight(season)).collect();
    let event = *rng.pick_weighted(&ForcedEvent::ALL, &weights)?;
    for (room, variable, delta) in event.effects() {
        if let Some(room) = state.rooms.get_mut(&room) {
            room.adjust(variable, delta);
        }
    }
    state.director.last_forced_tick = Some(state.tick);
    state.director.forced_events += 1;
    tracing::info!("Director forced {} at tick {}", event.as_str(), state.tick);
    Some(event)
}
