//! Hysteresis and per-tick rate limits
//!
//! Runs before conflict detection. A device on cooldown has its action
//! dropped; a registered rate constraint clamps the delta and starts a short
//! cooldown; thermal actuators acting on temperature always start the
//! minimum toggle cooldown.

use std::collections::BTreeMap;

use crate::actions::request::ProposedAction;
use crate::core::config::SimulationConfig;
use crate::core::types::{DeviceId, Variable};
use crate::world::WorldState;

/// Returns the (possibly clamped) action, or None when blocked
pub fn limit_action(
    state: &mut WorldState,
    mut action: ProposedAction,
    config: &SimulationConfig,
) -> Option<ProposedAction> {
    let remaining = state.cooldown(&action.device_id);
    if remaining > 0 {
        tracing::debug!(
            "{} {} blocked: cooldown {} tick(s)",
            action.device_id,
            action.kind,
            remaining
        );
        return None;
    }

    if let Some(max) = state
        .rate_constraint(&action.device_id, action.kind)
        .map(|c| c.max_change_per_tick)
    {
        if action.delta.abs() > max {
            let clamped = max.copysign(action.delta);
            tracing::debug!(
                "{} {} clamped from {} to {}",
                action.device_id,
                action.kind,
                action.delta,
                clamped
            );
            action.delta = clamped;
            extend_cooldown(
                &mut state.device_cooldowns,
                &action.device_id,
                config.rate_clamp_cooldown_ticks,
            );
        }
    }

    let thermal = state
        .device(&action.device_id)
        .is_some_and(|d| d.kind.is_thermal());
    if thermal && action.variable == Variable::Temperature {
        extend_cooldown(
            &mut state.device_cooldowns,
            &action.device_id,
            config.thermal_min_toggle_ticks,
        );
    }

    Some(action)
}

/// Set a cooldown, never shortening an existing one
pub fn extend_cooldown(cooldowns: &mut BTreeMap<DeviceId, u32>, id: &DeviceId, ticks: u32) {
    if ticks == 0 {
        return;
    }
    let entry = cooldowns.entry(id.clone()).or_insert(0);
    *entry = (*entry).max(ticks);
}

/// Decrement every positive cooldown by one, dropping expired entries
pub fn decrement_cooldowns(cooldowns: &mut BTreeMap<DeviceId, u32>) {
    for remaining in cooldowns.values_mut() {
        *remaining = remaining.saturating_sub(1);
    }
    cooldowns.retain(|_, remaining| *remaining > 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::ActionKind;
    use crate::core::types::RoomId;
    use crate::world::device::{DeviceKind, DeviceRuntime};
    use crate::world::RateConstraint;

    fn setup() -> (WorldState, SimulationConfig) {
        let config = SimulationConfig::default();
        let mut state = WorldState::new(1, &config);
        for (id, kind) in [("lamp", DeviceKind::Light), ("heater", DeviceKind::Heater)] {
            let device = DeviceRuntime::new(id, kind, RoomId::Bedroom);
            state.devices.insert(device.id.clone(), device);
        }
        state.rate_constraints.push(RateConstraint {
            device_id: DeviceId::from("lamp"),
            action: ActionKind::Brighten,
            max_change_per_tick: 50.0,
        });
        (state, config)
    }

    fn proposed(device: &str, kind: ActionKind, delta: f64) -> ProposedAction {
        ProposedAction {
            device_id: DeviceId::from(device),
            kind,
            room: RoomId::Bedroom,
            variable: kind.variable(),
            delta,
            power: kind.default_power(),
        }
    }

    #[test]
    fn test_clamp_then_block() {
        let (mut state, config) = setup();
        let first = limit_action(&mut state, proposed("lamp", ActionKind::Brighten, 200.0), &config).unwrap();
        assert_eq!(first.delta, 50.0);
        assert_eq!(state.cooldown(&DeviceId::from("lamp")), 1);
        assert!(limit_action(&mut state, proposed("lamp", ActionKind::Brighten, 200.0), &config).is_none());
    }

    #[test]
    fn test_clamp_keeps_sign() {
        let (mut state, config) = setup();
        state.rate_constraints.push(RateConstraint {
            device_id: DeviceId::from("lamp"),
            action: ActionKind::Dim,
            max_change_per_tick: 30.0,
        });
        let dimmed = limit_action(&mut state, proposed("lamp", ActionKind::Dim, -120.0), &config).unwrap();
        assert_eq!(dimmed.delta, -30.0);
    }

    #[test]
    fn test_within_limit_passes_untouched() {
        let (mut state, config) = setup();
        let action = proposed("lamp", ActionKind::Brighten, 40.0);
        assert_eq!(limit_action(&mut state, action.clone(), &config), Some(action));
        assert_eq!(state.cooldown(&DeviceId::from("lamp")), 0);
    }

    #[test]
    fn test_thermal_hysteresis() {
        let (mut state, config) = setup();
        assert!(limit_action(&mut state, proposed("heater", ActionKind::Heat, 1.0), &config).is_some());
        assert_eq!(state.cooldown(&DeviceId::from("heater")), 3);

        decrement_cooldowns(&mut state.device_cooldowns);
        decrement_cooldowns(&mut state.device_cooldowns);
        assert!(limit_action(&mut state, proposed("heater", ActionKind::Cool, -1.0), &config).is_none());
        decrement_cooldowns(&mut state.device_cooldowns);
        assert!(limit_action(&mut state, proposed("heater", ActionKind::Cool, -1.0), &config).is_some());
    }

    #[test]
    fn test_cooldowns_never_shorten() {
        let mut cooldowns = BTreeMap::new();
        let id = DeviceId::from("d");
        extend_cooldown(&mut cooldowns, &id, 3);
        extend_cooldown(&mut cooldowns, &id, 1);
        assert_eq!(cooldowns[&id], 3);
        for _ in 0..5 {
            decrement_cooldowns(&mut cooldowns);
        }
        assert!(cooldowns.is_empty());
    }
}
