//! Rule pack integration tests
//!
//! Loading packs from TOML and evaluating them against a live world.

use hearth::core::types::{DeviceId, RoomId, Variable};
use hearth::rules::{builtin, parse_rule_pack};
use hearth::simulation::{evaluate_rules, EvalContext};
use hearth::world::device::{DeviceKind, DeviceRuntime};
use hearth::world::events::EventKind;
use hearth::world::World;

const STRANGE_PACK: &str = r#"
id = "strange"
name = "Pack from a newer schema"

[[rules]]
id = "strange.full_moon_cooling"
scope = "room"
priority = 60
if = { temperature_gt = 20.0, moon_phase = "full" }
explain = "Cool things down under a full moon"
[rules.then.action_hint]
cool = 0.4

[[rules]]
id = "strange.bad_window"
scope = "world"
priority = 30
when = { time_between = "late evening" }
[rules.then.action_hint]
dim = 0.2
"#;

fn evaluate(world: &World) -> hearth::simulation::RuleEvaluation {
    let ctx = EvalContext::for_state(world.state(), world.calendar());
    evaluate_rules(world.rules(), world.state(), &ctx)
}

// ============================================================================
// Unknown Predicates
// ============================================================================

#[test]
fn test_unknown_predicate_loads_and_holds_vacuously() {
    let pack = parse_rule_pack(STRANGE_PACK).unwrap();
    let mut world = World::new(1);
    world.load_rule_packs(vec![pack]);

    let eval = evaluate(&world);

    // Every room is above 20C, so the known half of the predicate decides
    let fired: Vec<_> = eval
        .firings
        .iter()
        .filter(|f| f.rule_id == "strange.full_moon_cooling")
        .collect();
    assert_eq!(fired.len(), RoomId::ALL.len());
    assert!(eval.firings.iter().any(|f| f.rule_id == "strange.bad_window"));
}

#[test]
fn test_unknown_predicate_warns_once_per_occurrence() {
    let mut world = World::new(1);
    world.load_rule_packs(vec![parse_rule_pack(STRANGE_PACK).unwrap()]);

    let eval = evaluate(&world);
    assert_eq!(eval.warnings.len(), 2);
    assert!(eval.warnings.iter().any(|w| w.contains("moon_phase")));
    assert!(eval.warnings.iter().any(|w| w.contains("time_between")));

    // A second evaluation reports afresh
    assert_eq!(evaluate(&world).warnings.len(), 2);
}

#[test]
fn test_unknown_predicate_does_not_break_ticks() {
    let mut world = World::new(1);
    world.load_rule_packs(vec![
        builtin::home().unwrap(),
        parse_rule_pack(STRANGE_PACK).unwrap(),
    ]);
    world
        .add_device(DeviceRuntime::new("ac", DeviceKind::AirConditioner, RoomId::Office))
        .unwrap();
    world.run(5);
    let result = world.apply_delta(&DeviceId::from("ac"), RoomId::Office, Variable::Temperature, -1.0);
    assert_eq!(result.actions.len(), 1);
    assert!(!result.warnings.is_empty());
    assert_eq!(world.state().event_log.of_kind(EventKind::SystemError).count(), 0);
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn test_builtin_scopes() {
    let mut world = World::new(1);
    world.load_rule_packs(builtin::household().unwrap());
    world
        .add_device(DeviceRuntime::new("heater", DeviceKind::Heater, RoomId::Kitchen))
        .unwrap();
    world
        .add_device(DeviceRuntime::new("lamp", DeviceKind::Light, RoomId::Kitchen))
        .unwrap();

    let eval = evaluate(&world);
    let summer = eval
        .firings
        .iter()
        .find(|f| f.rule_id == "home.summer_heaters")
        .unwrap();
    assert_eq!(summer.device_id, Some(DeviceId::from("heater")));
    assert_eq!(
        eval.firings.iter().filter(|f| f.rule_id == "home.summer_heaters").count(),
        1
    );

    // Emergency lighting is world scope and gated on the flag
    assert!(!eval.firings.iter().any(|f| f.rule_id == "home.emergency_lighting"));
    world.set_emergency(true);
    let eval = evaluate(&world);
    let emergency = eval
        .firings
        .iter()
        .find(|f| f.rule_id == "home.emergency_lighting")
        .unwrap();
    assert_eq!(emergency.room, None);
}

#[test]
fn test_hard_rule_fires_only_past_threshold() {
    let mut world = World::new(1);
    world.load_rule_packs(vec![builtin::home().unwrap()]);
    assert!(evaluate(&world).hard.is_empty());

    world.set_value(RoomId::Bathroom, Variable::Humidity, 82.0).unwrap();
    let eval = evaluate(&world);
    assert_eq!(eval.hard.len(), 1);
    assert_eq!(eval.hard[0].rule_id, "home.humidity_ceiling");
    assert_eq!(eval.hard[0].room, Some(RoomId::Bathroom));

    world.step();
    assert_eq!(world.state().value(RoomId::Bathroom, Variable::Humidity), Some(70.0));
}

#[test]
fn test_reloading_replaces_rules() {
    let mut world = World::new(1);
    world.load_rule_packs(builtin::household().unwrap());
    let before = world.rules().rule_count();
    world.load_rule_packs(vec![builtin::quiet_hours().unwrap()]);
    assert!(world.rules().rule_count() < before);
    assert_eq!(world.rules().active_pack_ids(), vec!["quiet_hours"]);
    assert_eq!(
        world.state().event_log.of_kind(EventKind::RulePacksLoaded).count(),
        2
    );
}
