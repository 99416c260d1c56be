//! World tick loop
//!
//! One tick advances simulated time by a fixed step and performs, in order:
//! clock and RNG advance -> cooldown decay -> device status reset ->
//! director pacing -> safety enforcement -> harmony and divergence
//! analytics -> `system_tick` event.
//!
//! `step` is synchronous and never fails. Proposal generation happens
//! outside the tick and re-enters through `apply_actions`.

use serde::Serialize;
use serde_json::json;

use crate::core::types::Tick;
use crate::simulation::analytics::{household_health, record_divergence, sample_divergence};
use crate::simulation::director::{direct, ForcedEvent};
use crate::simulation::mediator::enforce_safety;
use crate::simulation::rate_limit::decrement_cooldowns;
use crate::world::device::DeviceStatus;
use crate::world::events::{EventKind, WorldEvent};
use crate::world::World;

/// Summary of one completed tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: Tick,
    pub time_sec: u64,
    pub health: f64,
    pub forced_event: Option<ForcedEvent>,
    /// Hard-rule enforcements made during the tick
    pub enforcements: usize,
    pub events_logged: u64,
}

impl World {
    /// Advance the world by one tick
    pub fn step(&mut self) -> TickReport {
        let first_seq = self.state.event_log.next_seq();

        self.state.tick += 1;
        self.state.time_sec = self.state.tick * self.config.tick_seconds;
        self.rng.next();
        self.state.rand_tick = self.rng.draws();

        decrement_cooldowns(&mut self.state.device_cooldowns);
        self.reset_statuses();

        let forced_event = self.run_director();

        let mut safety = {
            let (state, ctx) = self.split_for_mediation();
            enforce_safety(state, &ctx)
        };
        self.append_logs(&mut safety.logs);
        self.causal.prune(self.state.tick);

        let quiet = self.in_quiet_hours();
        let (health, room_health) =
            household_health(&self.state.rooms, &self.config.health, quiet);
        self.state.health = health;
        self.state.room_health = room_health;

        if let Some(sample) = sample_divergence(&self.state) {
            record_divergence(
                &mut self.state.divergence_history,
                sample,
                self.config.divergence_cap,
            );
        }

        self.state.version += 1;
        let hour = self.hour();
        self.log(
            WorldEvent::new(EventKind::SystemTick).with_data(json!({
                "tick": self.state.tick,
                "hour": hour,
                "health": health,
                "quiet_hours": quiet,
            })),
        );

        TickReport {
            tick: self.state.tick,
            time_sec: self.state.time_sec,
            health,
            forced_event,
            enforcements: safety.enforcements.len(),
            events_logged: self.state.event_log.next_seq() - first_seq,
        }
    }

    /// Run `ticks` steps, returning the final report
    pub fn run(&mut self, ticks: u64) -> Option<TickReport> {
        (0..ticks).map(|_| self.step()).last()
    }

    fn reset_statuses(&mut self) {
        let emergency = self.state.policies.emergency;
        for device in self.state.devices.values_mut() {
            device.status = match (emergency, device.status) {
                (true, _) => DeviceStatus::Safe,
                (false, DeviceStatus::Acting | DeviceStatus::Conflict | DeviceStatus::Safe) => {
                    DeviceStatus::Idle
                }
                (false, status) => status,
            };
        }
    }

    fn run_director(&mut self) -> Option<ForcedEvent> {
        let day = self.calendar.day_index(self.state.time_sec);
        let season = self.calendar.season(self.state.time_sec);
        let event = direct(
            &mut self.state,
            &mut self.rng,
            &self.config.director,
            day,
            season,
        )?;
        self.state.rand_tick = self.rng.draws();
        self.log(
            WorldEvent::new(EventKind::DirectorEvent)
                .with_data(json!({
                    "event": event,
                    "day": day,
                    "conflicts_today": self.state.director.conflicts_today,
                }))
                .with_description(event.description()),
        );
        Some(event)
    }
}
