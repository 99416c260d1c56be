//! Utility scoring for contending actions
//!
//! A contender's score is the sum of four terms:
//! - goal alignment: how well the action serves each of the device's goals,
//!   weighted by goal weight
//! - soft hints from matched rules, weighted by rule priority
//! - a bonus for the action's category rank in the household priority order
//! - a fixed penalty when the projected value leaves the safety band

use serde::Serialize;

use crate::actions::catalog::ActionKind;
use crate::actions::request::ProposedAction;
use crate::core::config::{HealthThresholds, SimulationConfig};
use crate::core::types::Variable;
use crate::simulation::rule_eval::RuleEvaluation;
use crate::world::device::DeviceRuntime;
use crate::world::room::RoomState;
use crate::world::Policies;

/// Alignment in roughly `[-1, 1]` between an action and a named goal
///
/// Comfort and safety read the room so that e.g. cooling only counts as
/// comfortable when the room is actually warm. Unknown goals score 0.
pub fn goal_alignment(
    action: ActionKind,
    goal: &str,
    room: &RoomState,
    thresholds: &HealthThresholds,
) -> f64 {
    use ActionKind::*;

    let temp = room.get(Variable::Temperature);
    let lumens = room.get(Variable::Lumens);
    let noise = room.get(Variable::Noise);
    let humidity = room.get(Variable::Humidity);
    let (comfort_low, comfort_high) = thresholds.temperature_comfort;
    let comfort_mid = (comfort_low + comfort_high) / 2.0;
    let (safe_low, safe_high) = thresholds.temperature_safe;

    match goal {
        "comfort" => match action {
            Cool if temp > comfort_high => 1.0,
            Cool if temp > comfort_mid => 0.3,
            Cool => -0.5,
            Heat if temp < comfort_low => 1.0,
            Heat if temp < comfort_mid => 0.3,
            Heat => -0.5,
            Brighten if lumens < 300.0 => 0.5,
            Brighten => -0.2,
            Dim if lumens > 600.0 => 0.5,
            Dim => 0.0,
            Quiet if noise > 45.0 => 0.6,
            Quiet => 0.1,
            PlayMusic if noise < 45.0 => 0.2,
            PlayMusic => -0.3,
            Humidify if humidity < 35.0 => 0.6,
            Humidify => -0.3,
            Dehumidify if humidity > 55.0 => 0.6,
            Dehumidify => -0.3,
            Soothe => 0.5,
            Nag => -0.4,
            Alert => 0.0,
        },
        "energy_saving" | "efficiency" => 0.3 - action.default_power(),
        "safety" => match action {
            Alert => 0.8,
            Quiet | Dim => 0.1,
            Cool if temp >= safe_high - 1.0 => 0.8,
            Heat if temp <= safe_low + 1.0 => 0.8,
            _ => 0.0,
        },
        "health" => match action {
            Alert => 1.0,
            Dehumidify | Soothe => 0.4,
            Quiet => 0.3,
            Nag => -0.3,
            _ => 0.0,
        },
        "warmth" => match action {
            Heat => 1.0,
            Cool => -1.0,
            _ => 0.0,
        },
        "cooling" => match action {
            Cool => 1.0,
            Heat => -1.0,
            _ => 0.0,
        },
        "entertainment" => match action {
            PlayMusic => 1.0,
            Brighten => 0.3,
            Quiet => -0.5,
            _ => 0.0,
        },
        "sleep" => match action {
            Dim | Quiet => 0.8,
            Alert => 0.2,
            Soothe => 0.3,
            Brighten | PlayMusic => -0.8,
            _ => 0.0,
        },
        "mood" => match action {
            Soothe => 1.0,
            PlayMusic => 0.4,
            Brighten => 0.2,
            Nag => -0.8,
            _ => 0.0,
        },
        "brightness" => match action {
            Brighten => 1.0,
            Dim => -0.8,
            Alert => -0.4,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

/// Per-term breakdown of one contender's score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilityScore {
    pub goals: f64,
    pub hints: f64,
    pub priority: f64,
    pub penalty: f64,
    pub total: f64,
    /// Rule whose hint contributed most in favour, if any
    pub top_rule: Option<String>,
}

/// Bonus for the action's category position in the priority order
pub fn priority_bonus(action: ActionKind, policies: &Policies, step: f64) -> f64 {
    let n = policies.priority_order.len();
    policies
        .rank(action.category())
        .map_or(0.0, |rank| step * (n - rank) as f64)
}

pub fn score_action(
    action: &ProposedAction,
    device: Option<&DeviceRuntime>,
    room: &RoomState,
    eval: &RuleEvaluation,
    policies: &Policies,
    config: &SimulationConfig,
) -> UtilityScore {
    let goals: f64 = device
        .map(|d| {
            d.goals
                .iter()
                .map(|g| goal_alignment(action.kind, &g.name, room, &config.health) * g.weight)
                .sum()
        })
        .unwrap_or(0.0);

    let mut hints = 0.0;
    let mut top: Option<(f64, &str)> = None;
    for hint in eval.hints_for(action.kind, action.room, &action.device_id) {
        let contribution = hint.contribution();
        hints += contribution;
        if contribution > 0.0 && top.map_or(true, |(best, _)| contribution > best) {
            top = Some((contribution, &hint.rule_id));
        }
    }

    let priority = priority_bonus(action.kind, policies, config.priority_bonus_step);

    let projected = room.get(action.variable) + action.delta;
    let penalty = match policies.limit(action.variable) {
        Some(bounds) if !bounds.contains(projected) => config.projected_violation_penalty,
        _ => 0.0,
    };

    UtilityScore {
        goals,
        hints,
        priority,
        penalty,
        total: goals + hints + priority - penalty,
        top_rule: top.map(|(_, id)| id.to_string()),
    }
}
