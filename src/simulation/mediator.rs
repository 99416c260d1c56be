//! Conflict mediation
//!
//! Turns one batch of (already rate-limited) proposals into a final, safe,
//! explained action set:
//! 1. evaluate rules; enforce hard violations on room state immediately
//! 2. group proposals and detect conflicts
//! 3. score every contender and keep the best one per conflict
//!
//! Winners are ordered by score, then device id, then action name, so the
//! outcome never depends on proposal order.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::actions::catalog::ActionKind;
use crate::actions::request::ProposedAction;
use crate::core::config::SimulationConfig;
use crate::core::types::{DeviceId, RoomId, Variable};
use crate::rules::store::RuleStore;
use crate::simulation::causal::{push_link, CausalLink, CausalTracker};
use crate::simulation::conflict::{detect_conflicts, ConflictRecord, Severity};
use crate::simulation::rule_eval::{
    apply_hard_violations, evaluate_rules, Enforcement, EvalContext, HardPass, RuleEvaluation, RuleFiring,
};
use crate::simulation::utility::{score_action, UtilityScore};
use crate::world::events::{EventKind, WorldEvent};
use crate::world::WorldState;

/// Read-only collaborators for one mediation pass
#[derive(Debug, Clone, Copy)]
pub struct MediationContext<'a> {
    pub rules: &'a RuleStore,
    pub eval: EvalContext,
    pub config: &'a SimulationConfig,
    pub causal: &'a CausalTracker,
}

/// Decision for one conflict, as written to the event log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictResolution {
    pub conflict_type: String,
    pub room: RoomId,
    pub variable: Variable,
    pub severity: Severity,
    pub winner: DeviceId,
    pub winning_action: ActionKind,
    pub losers: Vec<DeviceId>,
    /// Soft rule that contributed most to the winner, if any
    pub rule_applied: Option<String>,
    /// Best score per contending device
    pub utility_scores: BTreeMap<DeviceId, f64>,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct Mediation {
    /// Final action set: uncontested actions, then one winner per conflict
    pub actions: Vec<ProposedAction>,
    pub conflicts: Vec<ConflictRecord>,
    pub resolutions: Vec<ConflictResolution>,
    pub synergies: usize,
    /// Unstamped events: rule firings, alarms and conflict resolutions
    pub logs: Vec<WorldEvent>,
    pub rule_firings: Vec<RuleFiring>,
    pub enforcements: Vec<Enforcement>,
    pub causal_links: Vec<CausalLink>,
    pub warnings: Vec<String>,
}

pub fn mediate(
    state: &mut WorldState,
    ctx: &MediationContext,
    proposals: Vec<ProposedAction>,
) -> Mediation {
    let eval = evaluate_rules(ctx.rules, state, &ctx.eval);
    let enforcements = apply_hard_violations(state, &eval.hard, HardPass::PreScoring);
    let links = link_enforcements(state, ctx, &enforcements);

    let mut mediation = Mediation {
        logs: firing_events(&eval.firings, &enforcements, &links),
        ..Mediation::default()
    };
    mediation.logs.extend(alarm_events(&enforcements));

    let scan = detect_conflicts(&proposals, state.resources.power_capacity);
    mediation.actions = scan.uncontested;
    mediation.synergies = scan.synergies;

    for conflict in &scan.conflicts {
        let Some((winner, resolution)) = resolve(state, ctx, &eval, conflict) else {
            continue;
        };
        tracing::debug!("{}", resolution.explanation);
        mediation.logs.push(
            WorldEvent::new(EventKind::ConflictResolved)
                .in_room(resolution.room)
                .by_device(resolution.winner.clone())
                .with_data(serde_json::to_value(&resolution).unwrap_or_default())
                .with_description(resolution.explanation.clone()),
        );
        mediation.actions.push(winner);
        mediation.resolutions.push(resolution);
    }

    mediation.conflicts = scan.conflicts;
    mediation.rule_firings = eval.firings;
    mediation.warnings = eval.warnings;
    mediation.enforcements = enforcements;
    mediation.causal_links = links;
    mediation
}

fn resolve(
    state: &WorldState,
    ctx: &MediationContext,
    eval: &RuleEvaluation,
    conflict: &ConflictRecord,
) -> Option<(ProposedAction, ConflictResolution)> {
    let room = state.rooms.get(&conflict.room)?;

    let mut scored: Vec<(&ProposedAction, UtilityScore)> = conflict
        .contenders
        .iter()
        .map(|action| {
            let device = state.devices.get(&action.device_id);
            let score = score_action(action, device, room, eval, &state.policies, ctx.config);
            (action, score)
        })
        .collect();
    scored.sort_by(|(a, sa), (b, sb)| {
        sb.total
            .total_cmp(&sa.total)
            .then_with(|| a.device_id.cmp(&b.device_id))
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
    });

    let (winner, winner_score) = scored.first()?;
    let mut utility_scores: BTreeMap<DeviceId, f64> = BTreeMap::new();
    for (action, score) in &scored {
        let best = utility_scores
            .entry(action.device_id.clone())
            .or_insert(f64::NEG_INFINITY);
        *best = best.max(score.total);
    }
    let mut losers: Vec<DeviceId> = scored
        .iter()
        .map(|(a, _)| a.device_id.clone())
        .filter(|id| id != &winner.device_id)
        .collect();
    losers.sort();
    losers.dedup();

    let label = conflict.conflict_type.label();
    let beaten: Vec<String> = scored
        .iter()
        .skip(1)
        .map(|(a, s)| format!("{} {} ({:.2})", a.device_id, a.kind, s.total))
        .collect();
    let mut explanation = format!(
        "{} in {} ({}): {} {} wins with {:.2} over {}",
        label,
        conflict.room,
        conflict.severity.as_str(),
        winner.device_id,
        winner.kind,
        winner_score.total,
        beaten.join(", ")
    );
    if let Some(rule) = &winner_score.top_rule {
        explanation.push_str(&format!("; favoured by {}", rule));
    }
    if winner_score.penalty > 0.0 {
        explanation.push_str("; winner still projected outside the safety band");
    }

    let resolution = ConflictResolution {
        conflict_type: label,
        room: conflict.room,
        variable: conflict.variable,
        severity: conflict.severity,
        winner: winner.device_id.clone(),
        winning_action: winner.kind,
        losers,
        rule_applied: winner_score.top_rule.clone(),
        utility_scores,
        explanation,
    };
    Some(((*winner).clone(), resolution))
}

/// Attribute enforcements to recent actions and store the links
fn link_enforcements(
    state: &mut WorldState,
    ctx: &MediationContext,
    enforcements: &[Enforcement],
) -> Vec<CausalLink> {
    let links: Vec<CausalLink> = enforcements
        .iter()
        .filter_map(|e| ctx.causal.link(&e.rule_id, e.room, e.variable, state.tick))
        .collect();
    for link in &links {
        push_link(&mut state.causal_links, link.clone(), ctx.config.causal_cap);
    }
    links
}

/// One `rule_fired` event per firing; hard firings carry what they changed
fn firing_events(
    firings: &[RuleFiring],
    enforcements: &[Enforcement],
    links: &[CausalLink],
) -> Vec<WorldEvent> {
    firings
        .iter()
        .map(|firing| {
            let in_scope = |room: RoomId| firing.room.map_or(true, |r| r == room);
            let enforced: Vec<&Enforcement> = enforcements
                .iter()
                .filter(|e| e.rule_id == firing.rule_id && in_scope(e.room))
                .collect();
            let causes: Vec<&CausalLink> = links
                .iter()
                .filter(|l| l.rule_id == firing.rule_id && in_scope(l.room))
                .collect();

            let mut event = WorldEvent::new(EventKind::RuleFired)
                .with_data(json!({
                    "rule_id": firing.rule_id,
                    "hard": firing.hard,
                    "enforced": enforced,
                    "causal": causes,
                }))
                .with_description(format!("{}: {}", firing.rule_id, firing.explain));
            if let Some(room) = firing.room {
                event = event.in_room(room);
            }
            if let Some(device) = &firing.device_id {
                event = event.by_device(device.clone());
            }
            event
        })
        .collect()
}

fn alarm_events(enforcements: &[Enforcement]) -> Vec<WorldEvent> {
    enforcements
        .iter()
        .filter_map(|e| {
            let alarm = e.alarm.as_ref()?;
            Some(
                WorldEvent::new(EventKind::Alarm)
                    .in_room(e.room)
                    .with_data(json!({
                        "rule_id": e.rule_id,
                        "variable": e.variable,
                        "before": e.before,
                        "after": e.after,
                    }))
                    .with_description(alarm.clone()),
            )
        })
        .collect()
}

/// Outcome of a safety pass outside mediation
#[derive(Debug, Clone, Default)]
pub struct SafetyPass {
    pub logs: Vec<WorldEvent>,
    pub enforcements: Vec<Enforcement>,
    pub causal_links: Vec<CausalLink>,
}

/// Clamp every room into the policy band, then into hard-rule bounds
///
/// Only hard rules that actually changed something are logged.
pub fn enforce_safety(state: &mut WorldState, ctx: &MediationContext) -> SafetyPass {
    let mut pass = SafetyPass::default();

    let limits = state.policies.limits.clone();
    for room in state.rooms.values_mut() {
        for (variable, bounds) in &limits {
            let before = room.get(*variable);
            let after = bounds.clamp(before);
            if (after - before).abs() > f64::EPSILON {
                room.set(*variable, after);
                tracing::debug!("{} {} clamped into policy band: {} -> {}", room.id, variable, before, after);
                pass.logs.push(
                    WorldEvent::new(EventKind::Alarm)
                        .in_room(room.id)
                        .with_data(json!({
                            "variable": variable,
                            "before": before,
                            "after": after,
                        }))
                        .with_description(format!("{} clamped to the {} safety band", variable, room.id)),
                );
            }
        }
    }

    let eval = evaluate_rules(ctx.rules, state, &ctx.eval);
    let enforcements = apply_hard_violations(state, &eval.hard, HardPass::ClampOnly);
    if enforcements.is_empty() {
        return pass;
    }
    let links = link_enforcements(state, ctx, &enforcements);

    let fired: Vec<RuleFiring> = eval
        .firings
        .into_iter()
        .filter(|f| {
            f.hard
                && enforcements
                    .iter()
                    .any(|e| e.rule_id == f.rule_id && f.room.map_or(true, |r| r == e.room))
        })
        .collect();
    pass.logs.extend(firing_events(&fired, &enforcements, &links));
    pass.logs.extend(alarm_events(&enforcements));
    pass.enforcements = enforcements;
    pass.causal_links = links;
    pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::Season;
    use crate::rules::loader::builtin;
    use crate::world::device::{DeviceKind, DeviceRuntime};

    struct Fixture {
        state: WorldState,
        rules: RuleStore,
        config: SimulationConfig,
        causal: CausalTracker,
    }

    impl Fixture {
        fn new() -> Self {
            let config = SimulationConfig::default();
            let mut state = WorldState::new(1, &config);
            for (id, kind) in [
                ("thermo", DeviceKind::Thermostat),
                ("heater", DeviceKind::Heater),
                ("lamp", DeviceKind::Light),
                ("monitor", DeviceKind::HealthMonitor),
            ] {
                let device = DeviceRuntime::new(id, kind, RoomId::Bedroom);
                state.devices.insert(device.id.clone(), device);
            }
            Self {
                state,
                rules: RuleStore::with_packs(builtin::household().unwrap()),
                causal: CausalTracker::new(config.causal_window_ticks),
                config,
            }
        }

        fn mediate(&mut self, hour: f64, proposals: Vec<ProposedAction>) -> Mediation {
            let ctx = MediationContext {
                rules: &self.rules,
                eval: EvalContext {
                    hour,
                    season: Season::Summer,
                    emergency: false,
                },
                config: &self.config,
                causal: &self.causal,
            };
            mediate(&mut self.state, &ctx, proposals)
        }
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
    fn test_cooling_beats_heating_near_ceiling() {
        let mut fx = Fixture::new();
        fx.state
            .rooms
            .get_mut(&RoomId::Bedroom)
            .unwrap()
            .set(Variable::Temperature, 25.5);

        let result = fx.mediate(
            12.0,
            vec![
                proposed("heater", ActionKind::Heat, 2.0),
                proposed("thermo", ActionKind::Cool, -1.0),
            ],
        );
        assert_eq!(result.resolutions.len(), 1);
        let resolution = &result.resolutions[0];
        assert_eq!(resolution.winner, DeviceId::from("thermo"));
        assert_eq!(resolution.losers, vec![DeviceId::from("heater")]);
        assert_eq!(resolution.conflict_type, "temperature_conflict");
        assert!(result.actions.iter().all(|a| a.kind != ActionKind::Heat));
        assert!(resolution.utility_scores[&DeviceId::from("thermo")] > resolution.utility_scores[&DeviceId::from("heater")]);
        assert!(result.logs.iter().any(|e| e.kind == EventKind::ConflictResolved));
    }

    #[test]
    fn test_alert_beats_brighten_in_quiet_hours() {
        let mut fx = Fixture::new();
        let result = fx.mediate(
            23.0,
            vec![
                proposed("lamp", ActionKind::Brighten, 150.0),
                proposed("monitor", ActionKind::Alert, -100.0),
            ],
        );
        let resolution = &result.resolutions[0];
        assert_eq!(resolution.winner, DeviceId::from("monitor"));
        assert_eq!(resolution.rule_applied.as_deref(), Some("quiet.lights_down"));
        assert!(resolution.explanation.contains("lumens_conflict"));
    }

    #[test]
    fn test_tie_breaks_on_device_id() {
        let mut fx = Fixture::new();
        for id in ["b-lamp", "a-lamp"] {
            let device = DeviceRuntime::new(id, DeviceKind::Light, RoomId::Office);
            fx.state.devices.insert(device.id.clone(), device);
        }
        let mut up = proposed("b-lamp", ActionKind::Brighten, 50.0);
        up.room = RoomId::Office;
        let mut down = proposed("a-lamp", ActionKind::Brighten, -50.0);
        down.room = RoomId::Office;

        let first = fx.mediate(12.0, vec![up.clone(), down.clone()]);
        let second = fx.mediate(12.0, vec![down, up]);
        assert_eq!(first.resolutions[0].winner, DeviceId::from("a-lamp"));
        assert_eq!(first.resolutions[0].winner, second.resolutions[0].winner);
    }

    #[test]
    fn test_hard_rules_applied_before_scoring() {
        let mut fx = Fixture::new();
        fx.state
            .rooms
            .get_mut(&RoomId::Kitchen)
            .unwrap()
            .set(Variable::Temperature, 30.0);
        let result = fx.mediate(12.0, vec![]);
        assert_eq!(fx.state.value(RoomId::Kitchen, Variable::Temperature), Some(26.0));
        assert_eq!(result.enforcements.len(), 1);
        assert!(result.logs.iter().any(|e| e.kind == EventKind::Alarm));
        let fired = result
            .logs
            .iter()
            .find(|e| e.kind == EventKind::RuleFired && e.room == Some(RoomId::Kitchen))
            .unwrap();
        assert_eq!(fired.data.as_ref().unwrap()["enforced"][0]["after"], 26.0);
    }

    #[test]
    fn test_uncontested_actions_pass_through() {
        let mut fx = Fixture::new();
        let result = fx.mediate(12.0, vec![proposed("lamp", ActionKind::Dim, -50.0)]);
        assert_eq!(result.actions.len(), 1);
        assert!(result.conflicts.is_empty());
        assert!(result.resolutions.is_empty());
    }

    #[test]
    fn test_enforce_safety_clamps_and_links_cause() {
        let mut fx = Fixture::new();
        let heat = proposed("heater", ActionKind::Heat, 5.0);
        fx.causal.record(0, &heat);
        fx.state
            .rooms
            .get_mut(&RoomId::Bedroom)
            .unwrap()
            .set(Variable::Temperature, 29.0);

        let ctx = MediationContext {
            rules: &fx.rules,
            eval: EvalContext {
                hour: 12.0,
                season: Season::Summer,
                emergency: false,
            },
            config: &fx.config,
            causal: &fx.causal,
        };
        let pass = enforce_safety(&mut fx.state, &ctx);
        assert_eq!(fx.state.value(RoomId::Bedroom, Variable::Temperature), Some(26.0));
        // policy band already clamped to 26, so the hard rule has nothing left to do
        assert!(pass.enforcements.is_empty());
        assert_eq!(pass.logs.len(), 1);

        let noisy = fx.state.rooms.get_mut(&RoomId::Bedroom).unwrap();
        noisy.set(Variable::Noise, 90.0);
        let pass = enforce_safety(&mut fx.state, &ctx);
        assert_eq!(fx.state.value(RoomId::Bedroom, Variable::Noise), Some(85.0));
        assert_eq!(pass.enforcements.len(), 1);
        assert!(pass.causal_links.is_empty());
    }
}
