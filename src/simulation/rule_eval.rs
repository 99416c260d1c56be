//! Rule evaluation against the live world state
//!
//! World-scope rules run once, room-scope rules once per room and
//! device-scope rules once per device. Each match is split into a hard
//! violation (enforced directly on room state) or a soft hint (a utility
//! bias consumed by the mediator), and always produces a firing record.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::actions::catalog::ActionKind;
use crate::core::calendar::{Calendar, Season};
use crate::core::types::{DeviceId, RoomId, Variable};
use crate::rules::pack::{Scope, Transform, WorldRule};
use crate::rules::predicate::PredicateContext;
use crate::rules::store::RuleStore;
use crate::world::WorldState;

/// Time and policy inputs that predicates read besides room values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalContext {
    pub hour: f64,
    pub season: Season,
    pub emergency: bool,
}

impl EvalContext {
    pub fn for_state(state: &WorldState, calendar: &Calendar) -> Self {
        Self {
            hour: calendar.hour_of_day(state.time_sec),
            season: calendar.season(state.time_sec),
            emergency: state.policies.emergency,
        }
    }
}

/// A matched hard rule awaiting enforcement
#[derive(Debug, Clone, PartialEq)]
pub struct HardViolation {
    pub rule_id: String,
    /// None for world scope: enforced in every room
    pub room: Option<RoomId>,
    pub device_id: Option<DeviceId>,
    pub transform: Transform,
    pub explain: String,
}

/// A matched soft rule's bias toward (or against) one action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftHint {
    pub rule_id: String,
    pub action: ActionKind,
    /// Signed bias from the rule's `action_hint`
    pub bias: f64,
    /// Priority-derived weight in `[0, 1]`
    pub weight: f64,
    /// None for world scope: applies in every room
    pub room: Option<RoomId>,
    /// Set for device-scope rules: applies to that device only
    pub device_id: Option<DeviceId>,
}

impl SoftHint {
    pub fn applies_to(&self, action: ActionKind, room: RoomId, device_id: &DeviceId) -> bool {
        self.action == action
            && self.room.map_or(true, |r| r == room)
            && self.device_id.as_ref().map_or(true, |d| d == device_id)
    }

    pub fn contribution(&self) -> f64 {
        self.bias * self.weight
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleFiring {
    pub rule_id: String,
    pub hard: bool,
    pub explain: String,
    pub room: Option<RoomId>,
    pub device_id: Option<DeviceId>,
}

/// Outcome of one evaluation pass
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluation {
    pub hard: Vec<HardViolation>,
    pub soft: Vec<SoftHint>,
    pub firings: Vec<RuleFiring>,
    /// `"<rule id>: <key> (<reason>)"`, one per rule and unknown key
    pub warnings: Vec<String>,
}

impl RuleEvaluation {
    pub fn hints_for<'a>(
        &'a self,
        action: ActionKind,
        room: RoomId,
        device_id: &'a DeviceId,
    ) -> impl Iterator<Item = &'a SoftHint> {
        self.soft
            .iter()
            .filter(move |h| h.applies_to(action, room, device_id))
    }
}

/// One successful change made by a hard rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enforcement {
    pub rule_id: String,
    pub room: RoomId,
    pub variable: Variable,
    pub before: f64,
    pub after: f64,
    pub alarm: Option<String>,
    pub explain: String,
}

/// Walk every indexed rule against the current state
pub fn evaluate_rules(store: &RuleStore, state: &WorldState, ctx: &EvalContext) -> RuleEvaluation {
    let mut eval = RuleEvaluation::default();
    let mut warned: BTreeSet<(String, String)> = BTreeSet::new();

    let base = PredicateContext {
        hour: ctx.hour,
        season: ctx.season,
        emergency: ctx.emergency,
        room: None,
        rooms: &state.rooms,
        device_kind: None,
    };

    for rule in store.world_rules() {
        if rule_matches(rule, &base, &mut eval, &mut warned) {
            record_match(rule, None, None, &mut eval);
        }
    }

    for room in state.rooms.values() {
        let pctx = PredicateContext {
            room: Some(room),
            ..base
        };
        for rule in store.room_rules() {
            if rule_matches(rule, &pctx, &mut eval, &mut warned) {
                record_match(rule, Some(room.id), None, &mut eval);
            }
        }
    }

    for device in state.devices.values() {
        let pctx = PredicateContext {
            room: state.rooms.get(&device.room),
            device_kind: Some(device.kind),
            ..base
        };
        for rule in store.device_rules(device.kind) {
            if rule_matches(rule, &pctx, &mut eval, &mut warned) {
                record_match(rule, Some(device.room), Some(device.id.clone()), &mut eval);
            }
        }
    }

    eval
}

fn rule_matches(
    rule: &WorldRule,
    ctx: &PredicateContext,
    eval: &mut RuleEvaluation,
    warned: &mut BTreeSet<(String, String)>,
) -> bool {
    let mut unknown = Vec::new();
    let matched = rule.when.as_ref().map_or(true, |p| p.evaluate(ctx, &mut unknown))
        && !rule.unless.as_ref().map_or(false, |p| p.evaluate(ctx, &mut unknown))
        && rule.condition.as_ref().map_or(true, |p| p.evaluate(ctx, &mut unknown));

    for key in unknown {
        if warned.insert((rule.id.clone(), key.clone())) {
            tracing::warn!("Rule '{}': unknown predicate {}; treated as satisfied", rule.id, key);
            eval.warnings.push(format!("{}: {}", rule.id, key));
        }
    }
    matched
}

fn record_match(
    rule: &WorldRule,
    room: Option<RoomId>,
    device_id: Option<DeviceId>,
    eval: &mut RuleEvaluation,
) {
    eval.firings.push(RuleFiring {
        rule_id: rule.id.clone(),
        hard: rule.hard,
        explain: rule.explain.clone(),
        room,
        device_id: device_id.clone(),
    });

    if rule.hard {
        eval.hard.push(HardViolation {
            rule_id: rule.id.clone(),
            room,
            device_id,
            transform: rule.then.clone(),
            explain: rule.explain.clone(),
        });
        return;
    }

    let device_scoped = rule.scope == Scope::Device;
    for (name, bias) in &rule.then.action_hint {
        match ActionKind::parse(name) {
            Some(action) => eval.soft.push(SoftHint {
                rule_id: rule.id.clone(),
                action,
                bias: *bias,
                weight: rule.hint_weight(),
                room,
                device_id: if device_scoped { device_id.clone() } else { None },
            }),
            None => tracing::debug!("Rule '{}' hints unknown action '{}'", rule.id, name),
        }
    }
}

/// Which enforcement pass is running
///
/// Only the pre-scoring pass adds a rule's `delta`, and each (rule, room)
/// pair gets it at most once per tick. Later passes clamp to `min`/`max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardPass {
    PreScoring,
    ClampOnly,
}

/// Apply hard violations to room state, returning what actually changed
///
/// A violation without a target variable, or naming a room that does not
/// exist, is a no-op.
pub fn apply_hard_violations(
    state: &mut WorldState,
    hard: &[HardViolation],
    pass: HardPass,
) -> Vec<Enforcement> {
    let mut enforced = Vec::new();
    let tick = state.tick;
    for violation in hard {
        let Some(variable) = violation.transform.target else {
            continue;
        };
        let rooms: Vec<RoomId> = match violation.room {
            Some(room) => vec![room],
            None => state.rooms.keys().copied().collect(),
        };
        for room_id in rooms {
            if !state.rooms.contains_key(&room_id) {
                continue;
            }
            let with_delta = pass == HardPass::PreScoring
                && violation.transform.delta.is_some()
                && state.hard_deltas.claim(tick, &violation.rule_id, room_id);
            let Some(room) = state.rooms.get_mut(&room_id) else {
                continue;
            };
            let before = room.get(variable);
            let after = if with_delta {
                violation.transform.apply(before)
            } else {
                violation.transform.clamp(before)
            };
            if (after - before).abs() > f64::EPSILON {
                room.set(variable, after);
                enforced.push(Enforcement {
                    rule_id: violation.rule_id.clone(),
                    room: room_id,
                    variable,
                    before,
                    after,
                    alarm: violation.transform.alarm.clone(),
                    explain: violation.explain.clone(),
                });
            }
        }
    }
    enforced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimulationConfig;
    use crate::rules::loader::{builtin, parse_rule_pack};
    use crate::world::device::{DeviceKind, DeviceRuntime};

    fn state() -> WorldState {
        WorldState::new(1, &SimulationConfig::default())
    }

    fn ctx(hour: f64) -> EvalContext {
        EvalContext {
            hour,
            season: Season::Summer,
            emergency: false,
        }
    }

    #[test]
    fn test_hard_rule_fires_only_in_hot_room() {
        let store = RuleStore::with_packs(vec![builtin::home().unwrap()]);
        let mut state = state();
        state
            .rooms
            .get_mut(&RoomId::Kitchen)
            .unwrap()
            .set(Variable::Temperature, 28.0);

        let eval = evaluate_rules(&store, &state, &ctx(12.0));
        let hard: Vec<_> = eval.hard.iter().filter(|h| h.rule_id == "home.temperature_ceiling").collect();
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].room, Some(RoomId::Kitchen));

        let enforced = apply_hard_violations(&mut state, &eval.hard, HardPass::PreScoring);
        assert!(enforced.iter().any(|e| e.room == RoomId::Kitchen && e.after == 26.0));
        assert_eq!(state.value(RoomId::Kitchen, Variable::Temperature), Some(26.0));
    }

    #[test]
    fn test_quiet_hours_hints_per_room() {
        let store = RuleStore::with_packs(builtin::household().unwrap());
        let state = state();

        let night = evaluate_rules(&store, &state, &ctx(23.0));
        let lights_down: Vec<_> = night
            .soft
            .iter()
            .filter(|h| h.rule_id == "quiet.lights_down" && h.action == ActionKind::Brighten)
            .collect();
        assert_eq!(lights_down.len(), state.rooms.len());
        assert!(lights_down.iter().all(|h| h.bias < 0.0 && h.weight > 0.0));

        let day = evaluate_rules(&store, &state, &ctx(12.0));
        assert!(day.soft.iter().all(|h| !h.rule_id.starts_with("quiet.")));
    }

    #[test]
    fn test_unless_blocks_match() {
        let store = RuleStore::with_packs(builtin::household().unwrap());
        let state = state();
        let mut emergency = ctx(23.0);
        emergency.emergency = true;
        let eval = evaluate_rules(&store, &state, &emergency);
        assert!(!eval.firings.iter().any(|f| f.rule_id == "quiet.lights_down"));
        assert!(eval.firings.iter().any(|f| f.rule_id == "home.emergency_lighting"));
    }

    #[test]
    fn test_device_scope_rules() {
        let store = RuleStore::with_packs(vec![builtin::home().unwrap()]);
        let mut state = state();
        let heater = DeviceRuntime::new("heater-1", DeviceKind::Heater, RoomId::Bedroom);
        state.devices.insert(heater.id.clone(), heater);

        let eval = evaluate_rules(&store, &state, &ctx(12.0));
        let hint = eval
            .soft
            .iter()
            .find(|h| h.rule_id == "home.summer_heaters")
            .unwrap();
        assert_eq!(hint.device_id, Some(DeviceId::from("heater-1")));
        assert!(hint.applies_to(ActionKind::Heat, RoomId::Bedroom, &DeviceId::from("heater-1")));
        assert!(!hint.applies_to(ActionKind::Heat, RoomId::Bedroom, &DeviceId::from("other")));
    }

    #[test]
    fn test_unknown_predicate_warns_once_per_rule() {
        let pack = parse_rule_pack(
            r#"
            id = "odd"
            [[rules]]
            id = "odd.moon"
            scope = "room"
            if = { moon_phase = "full" }
            [rules.then]
            action_hint = { soothe = 0.2 }
            "#,
        )
        .unwrap();
        let store = RuleStore::with_packs(vec![pack]);
        let eval = evaluate_rules(&store, &state(), &ctx(12.0));
        assert_eq!(eval.warnings.len(), 1);
        assert!(eval.warnings[0].contains("moon_phase"));
        // vacuously true: fires in every room
        assert_eq!(eval.firings.len(), RoomId::ALL.len());
    }

    #[test]
    fn test_hard_rule_without_target_is_noop() {
        let mut state = state();
        let before = state.clone();
        let enforced = apply_hard_violations(
            &mut state,
            &[HardViolation {
                rule_id: "x".into(),
                room: None,
                device_id: None,
                transform: Transform::default(),
                explain: String::new(),
            }],
            HardPass::PreScoring,
        );
        assert!(enforced.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_hard_delta_lands_once_per_tick() {
        let vent = HardViolation {
            rule_id: "vent".into(),
            room: Some(RoomId::Kitchen),
            device_id: None,
            transform: Transform {
                target: Some(Variable::Temperature),
                delta: Some(-1.0),
                min: Some(16.0),
                ..Transform::default()
            },
            explain: String::new(),
        };
        let mut state = state();
        state.rooms.get_mut(&RoomId::Kitchen).unwrap().set(Variable::Temperature, 25.0);

        let first = apply_hard_violations(&mut state, std::slice::from_ref(&vent), HardPass::PreScoring);
        assert_eq!(first.len(), 1);
        assert_eq!(state.value(RoomId::Kitchen, Variable::Temperature), Some(24.0));

        assert!(apply_hard_violations(&mut state, std::slice::from_ref(&vent), HardPass::PreScoring).is_empty());
        assert!(apply_hard_violations(&mut state, std::slice::from_ref(&vent), HardPass::ClampOnly).is_empty());
        assert_eq!(state.value(RoomId::Kitchen, Variable::Temperature), Some(24.0));

        state.tick += 1;
        apply_hard_violations(&mut state, std::slice::from_ref(&vent), HardPass::PreScoring);
        assert_eq!(state.value(RoomId::Kitchen, Variable::Temperature), Some(23.0));
    }

    #[test]
    fn test_clamp_only_pass_still_enforces_bounds() {
        let cap = HardViolation {
            rule_id: "cap".into(),
            room: None,
            device_id: None,
            transform: Transform {
                target: Some(Variable::Noise),
                delta: Some(-5.0),
                max: Some(60.0),
                ..Transform::default()
            },
            explain: String::new(),
        };
        let mut state = state();
        state.rooms.get_mut(&RoomId::Office).unwrap().set(Variable::Noise, 75.0);
        let enforced = apply_hard_violations(&mut state, &[cap], HardPass::ClampOnly);
        assert_eq!(enforced.len(), 1);
        assert_eq!(state.value(RoomId::Office, Variable::Noise), Some(60.0));
        assert!(state.hard_deltas.applied.is_empty());
    }
}
