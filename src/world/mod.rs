//! The household world: state snapshot plus the component that owns it
//!
//! [`WorldState`] is plain serialisable data. [`World`] owns exactly one
//! state together with the rule store, RNG and config, and is the only
//! writer: mediation (`apply_actions` and friends) and the tick loop
//! (`step`) are methods on it. Consumers read through [`World::state`] or
//! take an owned [`World::snapshot`].

pub mod charter;
pub mod device;
pub mod events;
pub mod room;

pub use charter::Charter;
pub use device::{DeviceKind, DeviceRuntime, DeviceStatus, Goal};
pub use events::{EventKind, EventLog, WorldEvent};
pub use room::{Bounds, RoomState};

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::actions::catalog::{ActionCategory, ActionKind};
use crate::core::calendar::{Calendar, TimeWindow};
use crate::core::config::SimulationConfig;
use crate::core::error::{HearthError, Result};
use crate::core::rng::ParkMiller;
use crate::core::types::{DeviceId, RoomId, Tick, Variable};
use crate::rules::pack::RulePack;
use crate::rules::store::RuleStore;
use crate::simulation::analytics::DivergenceSample;
use crate::simulation::causal::{CausalLink, CausalTracker};
use crate::simulation::director::DirectorState;

/// Household policies consulted by mediation and analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policies {
    /// Categories in descending priority; earlier ranks earn a larger bonus
    pub priority_order: Vec<ActionCategory>,
    pub quiet_hours: TimeWindow,
    /// Engine-enforced safety band per variable
    pub limits: BTreeMap<Variable, Bounds>,
    pub emergency: bool,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            priority_order: ActionCategory::DEFAULT_ORDER.to_vec(),
            quiet_hours: TimeWindow::new(22.0, 7.0),
            limits: BTreeMap::from([
                (Variable::Temperature, Bounds::new(16.0, 26.0)),
                (Variable::Lumens, Bounds::new(0.0, 2000.0)),
                (Variable::Noise, Bounds::new(0.0, 100.0)),
                (Variable::Humidity, Bounds::new(10.0, 90.0)),
                (Variable::MoodScore, Bounds::new(0.0, 1.0)),
            ]),
            emergency: false,
        }
    }
}

impl Policies {
    /// Rank of a category in the priority order (0 = highest)
    pub fn rank(&self, category: ActionCategory) -> Option<usize> {
        self.priority_order.iter().position(|c| *c == category)
    }

    pub fn limit(&self, variable: Variable) -> Option<Bounds> {
        self.limits.get(&variable).copied()
    }
}

/// Shared household budgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    /// Combined power demand above this is a resource conflict
    pub power_capacity: f64,
    pub bandwidth_budget: f64,
    pub privacy_budget: f64,
    /// Power drawn by the last mediated action set
    pub power_drawn: f64,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            power_capacity: 1.0,
            bandwidth_budget: 1.0,
            privacy_budget: 1.0,
            power_drawn: 0.0,
        }
    }
}

/// Per-device, per-action cap on change per tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConstraint {
    pub device_id: DeviceId,
    pub action: ActionKind,
    pub max_change_per_tick: f64,
}

/// Everything a consumer may read between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub tick: Tick,
    pub time_sec: u64,
    /// Incremented on every mutation batch
    pub version: u64,
    pub rooms: BTreeMap<RoomId, RoomState>,
    pub devices: BTreeMap<DeviceId, DeviceRuntime>,
    pub policies: Policies,
    pub resources: Resources,
    /// Household harmony in `[0, 1]`
    pub health: f64,
    pub room_health: BTreeMap<RoomId, f64>,
    pub event_log: EventLog,
    pub seed: u64,
    /// RNG draws consumed so far
    pub rand_tick: u64,
    pub charter: Option<Charter>,
    pub divergence_history: VecDeque<DivergenceSample>,
    pub causal_links: VecDeque<CausalLink>,
    pub device_cooldowns: BTreeMap<DeviceId, u32>,
    pub rate_constraints: Vec<RateConstraint>,
    pub director: DirectorState,
    /// (rule, room) pairs whose hard-rule delta has landed this tick
    #[serde(default)]
    pub hard_deltas: HardDeltaLedger,
}

/// Hard-rule deltas already applied during one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardDeltaLedger {
    pub tick: Tick,
    pub applied: BTreeSet<(String, RoomId)>,
}

impl HardDeltaLedger {
    /// Record a delta for `tick`; false when it already landed this tick
    pub fn claim(&mut self, tick: Tick, rule_id: &str, room: RoomId) -> bool {
        if self.tick != tick {
            self.tick = tick;
            self.applied.clear();
        }
        self.applied.insert((rule_id.to_string(), room))
    }
}

impl WorldState {
    pub fn new(seed: u64, config: &SimulationConfig) -> Self {
        let rooms: BTreeMap<RoomId, RoomState> = RoomId::ALL
            .into_iter()
            .map(|id| (id, RoomState::new(id)))
            .collect();
        Self {
            tick: 0,
            time_sec: 0,
            version: 0,
            rooms,
            devices: BTreeMap::new(),
            policies: Policies::default(),
            resources: Resources::default(),
            health: 1.0,
            room_health: BTreeMap::new(),
            event_log: EventLog::new(config.event_log_cap),
            seed,
            rand_tick: 0,
            charter: None,
            divergence_history: VecDeque::new(),
            causal_links: VecDeque::new(),
            device_cooldowns: BTreeMap::new(),
            rate_constraints: Vec::new(),
            director: DirectorState::default(),
            hard_deltas: HardDeltaLedger::default(),
        }
    }

    pub fn room(&self, room: RoomId) -> Option<&RoomState> {
        self.rooms.get(&room)
    }

    pub fn value(&self, room: RoomId, variable: Variable) -> Option<f64> {
        self.rooms.get(&room).map(|r| r.get(variable))
    }

    pub fn device(&self, id: &DeviceId) -> Option<&DeviceRuntime> {
        self.devices.get(id)
    }

    pub fn cooldown(&self, id: &DeviceId) -> u32 {
        self.device_cooldowns.get(id).copied().unwrap_or(0)
    }

    /// Events appended at or after `seq`, still in the log
    pub fn events_since(&self, seq: u64) -> impl Iterator<Item = &WorldEvent> {
        self.event_log.since(seq)
    }

    pub fn rate_constraint(&self, id: &DeviceId, action: ActionKind) -> Option<&RateConstraint> {
        self.rate_constraints
            .iter()
            .find(|c| &c.device_id == id && c.action == action)
    }
}

/// Owner of the world state and the only component allowed to mutate it
#[derive(Debug)]
pub struct World {
    pub(crate) state: WorldState,
    pub(crate) rules: RuleStore,
    pub(crate) rng: ParkMiller,
    pub(crate) config: SimulationConfig,
    pub(crate) calendar: Calendar,
    pub(crate) causal: CausalTracker,
}

impl World {
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, SimulationConfig::default())
    }

    pub fn with_config(seed: u64, config: SimulationConfig) -> Self {
        Self {
            state: WorldState::new(seed, &config),
            rules: RuleStore::new(),
            rng: ParkMiller::new(seed),
            calendar: config.calendar(),
            causal: CausalTracker::new(config.causal_window_ticks),
            config,
        }
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Owned copy for consumers outside the tick owner
    pub fn snapshot(&self) -> WorldState {
        self.state.clone()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn current_tick(&self) -> Tick {
        self.state.tick
    }

    /// Simulated hour of day
    pub fn hour(&self) -> f64 {
        self.calendar.hour_of_day(self.state.time_sec)
    }

    pub fn in_quiet_hours(&self) -> bool {
        self.state.policies.quiet_hours.contains(self.hour())
    }

    /// Stamp and append an event
    pub fn log(&mut self, event: WorldEvent) -> u64 {
        let event = event.stamped(self.state.tick, self.state.time_sec);
        self.state.event_log.push(event)
    }

    /// Replace the active rule set
    pub fn load_rule_packs(&mut self, packs: Vec<RulePack>) {
        let ids: Vec<String> = packs.iter().map(|p| p.id.clone()).collect();
        self.rules.load_rule_packs(packs);
        let active = self.rules.active_pack_ids().join(", ");
        let count = self.rules.rule_count();
        self.state.version += 1;
        self.log(
            WorldEvent::new(EventKind::RulePacksLoaded)
                .with_data(json!({ "packs": ids, "rules": count }))
                .with_description(format!("Loaded rule packs [{}] ({} rules active)", active, count)),
        );
    }

    /// Register a device; goal weights are normalised to sum to 1.0
    pub fn add_device(&mut self, mut device: DeviceRuntime) -> Result<()> {
        if self.state.devices.contains_key(&device.id) {
            return Err(HearthError::DuplicateDevice(device.id));
        }
        if !self.state.rooms.contains_key(&device.room) {
            return Err(HearthError::RoomNotFound(device.room));
        }
        if device.normalize_goals() {
            tracing::warn!("Goal weights for {} did not sum to 1.0; normalised", device.id);
        }
        device.joined_tick = self.state.tick;
        device.status = if self.state.policies.emergency {
            DeviceStatus::Safe
        } else {
            DeviceStatus::Idle
        };

        let id = device.id.clone();
        let room = device.room;
        let description = format!("{} ({}) joined the {}", id, device.kind, room);
        self.state.devices.insert(id.clone(), device);
        self.state.version += 1;
        self.log(
            WorldEvent::new(EventKind::DeviceJoined)
                .in_room(room)
                .by_device(id)
                .with_description(description),
        );
        Ok(())
    }

    /// Remove a device along with its cooldown and rate constraints
    pub fn remove_device(&mut self, id: &DeviceId) -> Result<DeviceRuntime> {
        let device = self
            .state
            .devices
            .remove(id)
            .ok_or_else(|| HearthError::DeviceNotFound(id.clone()))?;
        self.state.device_cooldowns.remove(id);
        self.state.rate_constraints.retain(|c| &c.device_id != id);
        self.state.version += 1;
        self.log(
            WorldEvent::new(EventKind::DeviceRemoved)
                .in_room(device.room)
                .by_device(id.clone())
                .with_description(format!("{} left the household", id)),
        );
        Ok(device)
    }

    /// Register (or replace) a rate constraint for one device action
    pub fn add_rate_constraint(
        &mut self,
        device_id: &DeviceId,
        action: ActionKind,
        max_change_per_tick: f64,
    ) -> Result<()> {
        if !self.state.devices.contains_key(device_id) {
            return Err(HearthError::DeviceNotFound(device_id.clone()));
        }
        if !max_change_per_tick.is_finite() || max_change_per_tick < 0.0 {
            return Err(HearthError::InvalidConfig(format!(
                "max_change_per_tick must be a non-negative number, got {}",
                max_change_per_tick
            )));
        }
        self.state
            .rate_constraints
            .retain(|c| !(&c.device_id == device_id && c.action == action));
        self.state.rate_constraints.push(RateConstraint {
            device_id: device_id.clone(),
            action,
            max_change_per_tick,
        });
        self.state.version += 1;
        Ok(())
    }

    pub fn set_charter(&mut self, charter: Option<Charter>) {
        self.state.charter = charter;
        self.state.version += 1;
    }

    pub fn set_policies(&mut self, policies: Policies) {
        self.state.policies = policies;
        self.state.version += 1;
    }

    pub fn set_resources(&mut self, resources: Resources) {
        self.state.resources = resources;
        self.state.version += 1;
    }

    /// Raise or clear the household emergency flag
    pub fn set_emergency(&mut self, emergency: bool) {
        if self.state.policies.emergency == emergency {
            return;
        }
        self.state.policies.emergency = emergency;
        let status = if emergency {
            DeviceStatus::Safe
        } else {
            DeviceStatus::Idle
        };
        for device in self.state.devices.values_mut() {
            device.status = status;
        }
        self.state.version += 1;
        self.log(
            WorldEvent::new(EventKind::EmergencyChanged)
                .with_data(json!({ "emergency": emergency }))
                .with_description(if emergency {
                    "Emergency raised; devices in safe mode"
                } else {
                    "Emergency cleared"
                }),
        );
    }

    /// Directly set a room variable (scenario setup and external sensors)
    pub fn set_value(&mut self, room: RoomId, variable: Variable, value: f64) -> Result<()> {
        let state = self
            .state
            .rooms
            .get_mut(&room)
            .ok_or(HearthError::RoomNotFound(room))?;
        state.set(variable, value);
        self.state.version += 1;
        Ok(())
    }

    /// Record a failure from outside the core (e.g. a planner) as an event
    pub fn record_system_error(&mut self, device_id: Option<DeviceId>, message: impl Into<String>) {
        let message = message.into();
        match &device_id {
            Some(id) => tracing::warn!("System error ({}): {}", id, message),
            None => tracing::warn!("System error: {}", message),
        }
        let mut event = WorldEvent::new(EventKind::SystemError).with_description(message);
        if let Some(id) = device_id {
            if let Some(device) = self.state.devices.get(&id) {
                event = event.in_room(device.room);
            }
            event = event.by_device(id);
        }
        self.log(event);
    }
}
