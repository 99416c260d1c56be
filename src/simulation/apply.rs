//! Mutation entry points on [`World`]
//!
//! Every proposal enters through `apply_actions` (or one of its wrappers)
//! and is mediated against the live state, however stale the inputs it was
//! planned from. Nothing here returns an error: invalid proposals become
//! `system_error` events.

use serde_json::json;

use crate::actions::catalog::ActionKind;
use crate::actions::request::{ActionRequest, DevicePlan, ProposedAction};
use crate::core::types::{DeviceId, RoomId, Variable};
use crate::simulation::mediator::{enforce_safety, mediate, Mediation, MediationContext};
use crate::simulation::rate_limit::limit_action;
use crate::simulation::rule_eval::EvalContext;
use crate::world::device::DeviceStatus;
use crate::world::events::{EventKind, WorldEvent};
use crate::world::{World, WorldState};

impl World {
    /// Mutable state alongside read-only mediation collaborators
    pub(crate) fn split_for_mediation(&mut self) -> (&mut WorldState, MediationContext<'_>) {
        let eval = EvalContext::for_state(&self.state, &self.calendar);
        let ctx = MediationContext {
            rules: &self.rules,
            eval,
            config: &self.config,
            causal: &self.causal,
        };
        (&mut self.state, ctx)
    }

    /// Validate and rate-limit one action without mediating it
    ///
    /// Returns None when the device is cooling down. Clamps and cooldowns
    /// are recorded on the world.
    pub fn limit_action(&mut self, action: ProposedAction) -> Option<ProposedAction> {
        limit_action(&mut self.state, action, &self.config)
    }

    /// Mediate one batch of plans and apply the result
    pub fn apply_actions(&mut self, plans: &[DevicePlan]) -> Mediation {
        let mut proposals = Vec::new();
        for plan in plans {
            let Some(home_room) = self.state.devices.get(&plan.device_id).map(|d| d.room) else {
                self.record_system_error(
                    Some(plan.device_id.clone()),
                    format!("Plan from unknown device {}", plan.device_id),
                );
                continue;
            };
            for request in &plan.actions {
                match ProposedAction::resolve(&plan.device_id, home_room, request) {
                    Ok(action) if self.state.rooms.contains_key(&action.room) => {
                        if let Some(limited) = self.limit_action(action) {
                            proposals.push(limited);
                        }
                    }
                    Ok(action) => self.record_system_error(
                        Some(plan.device_id.clone()),
                        format!("{} targets unknown room {}", action.kind, action.room),
                    ),
                    Err(e) => self.record_system_error(Some(plan.device_id.clone()), e.to_string()),
                }
            }
        }

        let mut mediation = {
            let (state, ctx) = self.split_for_mediation();
            mediate(state, &ctx, proposals)
        };
        self.append_logs(&mut mediation.logs);

        for action in &mediation.actions {
            self.apply_one(action);
        }
        let power: f64 = mediation.actions.iter().map(|a| a.power).sum();
        self.state.resources.power_drawn = power;

        self.update_statuses(&mediation);

        let tick = self.state.tick;
        for action in &mediation.actions {
            self.causal.record(tick, action);
        }

        let mut safety = {
            let (state, ctx) = self.split_for_mediation();
            enforce_safety(state, &ctx)
        };
        self.append_logs(&mut safety.logs);
        mediation.logs.extend(safety.logs);
        mediation.enforcements.extend(safety.enforcements);
        mediation.causal_links.extend(safety.causal_links);

        self.state
            .director
            .note_mediation(mediation.conflicts.len(), mediation.synergies, &self.config.director);
        self.state.version += 1;
        mediation
    }

    /// Stamp and append, leaving the stamped copies in place
    pub(crate) fn append_logs(&mut self, logs: &mut [WorldEvent]) {
        for event in logs.iter_mut() {
            *event = event.clone().stamped(self.state.tick, self.state.time_sec);
            event.seq = self.state.event_log.push(event.clone());
        }
    }

    /// Mediate a single device's plan
    pub fn apply_plan(&mut self, plan: &DevicePlan) -> Mediation {
        self.apply_actions(std::slice::from_ref(plan))
    }

    /// Single-action convenience wrapper around `apply_actions`
    pub fn apply_delta(
        &mut self,
        device_id: &DeviceId,
        room: RoomId,
        variable: Variable,
        delta: f64,
    ) -> Mediation {
        let kind = ActionKind::for_delta(variable, delta);
        let request = ActionRequest::new(kind.as_str())
            .with_delta(delta)
            .in_room(room);
        self.apply_plan(&DevicePlan::new(device_id.clone(), vec![request]))
    }

    pub fn heat(&mut self, device_id: &DeviceId, room: RoomId, delta: f64) -> Mediation {
        self.apply_delta(device_id, room, Variable::Temperature, delta)
    }

    pub fn illuminate(&mut self, device_id: &DeviceId, room: RoomId, delta: f64) -> Mediation {
        self.apply_delta(device_id, room, Variable::Lumens, delta)
    }

    pub fn adjust_noise(&mut self, device_id: &DeviceId, room: RoomId, delta: f64) -> Mediation {
        self.apply_delta(device_id, room, Variable::Noise, delta)
    }

    pub fn adjust_humidity(&mut self, device_id: &DeviceId, room: RoomId, delta: f64) -> Mediation {
        self.apply_delta(device_id, room, Variable::Humidity, delta)
    }

    pub fn adjust_mood(&mut self, device_id: &DeviceId, room: RoomId, delta: f64) -> Mediation {
        self.apply_delta(device_id, room, Variable::MoodScore, delta)
    }

    fn apply_one(&mut self, action: &ProposedAction) {
        let Some(room) = self.state.rooms.get_mut(&action.room) else {
            return;
        };
        let before = room.get(action.variable);
        let after = room.adjust(action.variable, action.delta);
        if let Some(device) = self.state.devices.get_mut(&action.device_id) {
            device.last_action = Some(action.kind);
        }
        self.log(
            WorldEvent::new(EventKind::ActionApplied)
                .in_room(action.room)
                .by_device(action.device_id.clone())
                .with_data(json!({
                    "action": action.kind,
                    "variable": action.variable,
                    "delta": action.delta,
                    "before": before,
                    "after": after,
                    "power": action.power,
                }))
                .with_description(format!(
                    "{} {} {} in {}: {:.2} -> {:.2}",
                    action.device_id, action.kind, action.variable, action.room, before, after
                )),
        );
    }

    fn update_statuses(&mut self, mediation: &Mediation) {
        let emergency = self.state.policies.emergency;
        let mut set = |id: &DeviceId, status: DeviceStatus| {
            if let Some(device) = self.state.devices.get_mut(id) {
                device.status = if emergency { DeviceStatus::Safe } else { status };
            }
        };
        for resolution in &mediation.resolutions {
            for loser in &resolution.losers {
                set(loser, DeviceStatus::Conflict);
            }
        }
        for action in &mediation.actions {
            set(&action.device_id, DeviceStatus::Acting);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use crate::rules::loader::builtin;
    use crate::world::device::{DeviceKind, DeviceRuntime};

    fn world() -> World {
        let mut world = World::new(42);
        world.load_rule_packs(builtin::household().unwrap());
        for (id, kind, room) in [
            ("thermo", DeviceKind::Thermostat, RoomId::LivingRoom),
            ("heater", DeviceKind::Heater, RoomId::LivingRoom),
            ("lamp", DeviceKind::Light, RoomId::Office),
        ] {
            world.add_device(DeviceRuntime::new(id, kind, room)).unwrap();
        }
        world
    }

    #[test]
    fn test_single_action_applies() {
        let mut world = world();
        let lamp = DeviceId::from("lamp");
        let result = world.illuminate(&lamp, RoomId::Office, 100.0);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(world.state().value(RoomId::Office, Variable::Lumens), Some(400.0));
        let device = world.state().device(&lamp).unwrap();
        assert_eq!(device.status, DeviceStatus::Acting);
        assert_eq!(device.last_action, Some(ActionKind::Brighten));
        assert_eq!(world.state().event_log.of_kind(EventKind::ActionApplied).count(), 1);
    }

    #[test]
    fn test_conflict_updates_statuses() {
        let mut world = world();
        world
            .set_value(RoomId::LivingRoom, Variable::Temperature, 25.5)
            .unwrap();
        let plans = vec![
            DevicePlan::new("heater", vec![ActionRequest::new("heat").with_delta(2.0)]),
            DevicePlan::new("thermo", vec![ActionRequest::new("cool").with_delta(-1.0)]),
        ];
        let result = world.apply_actions(&plans);
        assert_eq!(result.resolutions.len(), 1);
        assert_eq!(world.state().value(RoomId::LivingRoom, Variable::Temperature), Some(24.5));
        assert_eq!(
            world.state().device(&DeviceId::from("heater")).unwrap().status,
            DeviceStatus::Conflict
        );
        assert_eq!(
            world.state().device(&DeviceId::from("thermo")).unwrap().status,
            DeviceStatus::Acting
        );
        assert!(result.logs.iter().all(|e| e.at == world.state().tick));
    }

    #[test]
    fn test_invalid_proposals_become_system_errors() {
        let mut world = world();
        let plans = vec![
            DevicePlan::new("ghost", vec![ActionRequest::new("heat")]),
            DevicePlan::new("lamp", vec![ActionRequest::new("teleport")]),
        ];
        let result = world.apply_actions(&plans);
        assert!(result.actions.is_empty());
        let errors: Vec<_> = world.state().event_log.of_kind(EventKind::SystemError).collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[1].description.as_deref().unwrap().contains("teleport"));
    }

    #[test]
    fn test_overshoot_is_clamped_into_band() {
        let mut world = world();
        world
            .set_value(RoomId::LivingRoom, Variable::Temperature, 25.0)
            .unwrap();
        let result = world.heat(&DeviceId::from("heater"), RoomId::LivingRoom, 4.0);
        assert_eq!(result.actions.len(), 1);
        assert_eq!(world.state().value(RoomId::LivingRoom, Variable::Temperature), Some(26.0));
        assert!(result.logs.iter().any(|e| e.kind == EventKind::Alarm));
    }

    #[test]
    fn test_hard_rule_after_apply_records_causal_link() {
        let mut world = world();
        let lamp_room = RoomId::Office;
        world.set_value(lamp_room, Variable::Noise, 80.0).unwrap();
        world
            .add_device(DeviceRuntime::new("speaker", DeviceKind::Speaker, lamp_room))
            .unwrap();
        world.adjust_noise(&DeviceId::from("speaker"), lamp_room, 10.0);
        assert_eq!(world.state().value(lamp_room, Variable::Noise), Some(85.0));
        let link = world.state().causal_links.back().unwrap();
        assert_eq!(link.device_id, DeviceId::from("speaker"));
        assert_eq!(link.rule_id, "home.noise_ceiling");
        assert_eq!(link.ticks_apart, 0);
        let fired = world
            .state()
            .event_log
            .of_kind(EventKind::RuleFired)
            .last()
            .unwrap();
        assert_eq!(fired.data.as_ref().unwrap()["causal"][0]["device_id"], "speaker");
    }

    #[test]
    fn test_thermal_cooldown_blocks_next_proposal() {
        let mut world = world();
        let heater = DeviceId::from("heater");
        world.heat(&heater, RoomId::LivingRoom, 1.0);
        let blocked = world.heat(&heater, RoomId::LivingRoom, 1.0);
        assert!(blocked.actions.is_empty());
        assert_eq!(world.state().cooldown(&heater), SimulationConfig::default().thermal_min_toggle_ticks);
    }
}
