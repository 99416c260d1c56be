//! Hearth - entry point
//!
//! Builds a sample household, loads rule packs and runs it either headless
//! with the scripted planner (fully deterministic) or through the async
//! runtime with the LLM planner.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;

use hearth::actions::catalog::ActionKind;
use hearth::core::config::SimulationConfig;
use hearth::core::error::Result;
use hearth::core::types::{DeviceId, RoomId};
use hearth::llm::LlmPlanner;
use hearth::planning::{ProposalRequest, ScriptedPlanner};
use hearth::rules::{builtin, load_rule_pack};
use hearth::simulation::Runtime;
use hearth::world::charter::Charter;
use hearth::world::device::{DeviceKind, DeviceRuntime};
use hearth::world::events::EventKind;
use hearth::world::World;

#[derive(Parser, Debug)]
#[command(name = "hearth")]
#[command(about = "Run a household device mediation simulation")]
struct Args {
    /// Random seed for reproducible runs
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Ticks to simulate
    #[arg(long, default_value_t = 360)]
    ticks: u64,

    /// Rule pack files (TOML); defaults to the built-in household packs
    #[arg(long, num_args = 1..)]
    rules: Vec<PathBuf>,

    /// Charter with per-room targets for divergence tracking
    #[arg(long)]
    charter: Option<PathBuf>,

    /// Simulation config (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Plan with an LLM (needs LLM_API_KEY) through the async runtime
    #[arg(long)]
    llm: bool,

    /// Wall-clock milliseconds per tick when running with --llm
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Print the final world snapshot as JSON
    #[arg(long)]
    json: bool,
}

/// End-of-run summary
#[derive(Serialize)]
struct RunSummary {
    seed: u64,
    ticks: u64,
    health: f64,
    conflicts_resolved: usize,
    rules_fired: usize,
    alarms: usize,
    system_errors: usize,
    causal_links: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hearth=info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    let mut world = World::with_config(args.seed, config);

    let packs = if args.rules.is_empty() {
        builtin::household()?
    } else {
        args.rules
            .iter()
            .map(|path| load_rule_pack(path))
            .collect::<Result<Vec<_>>>()?
    };
    world.load_rule_packs(packs);

    if let Some(path) = &args.charter {
        world.set_charter(Some(Charter::load(path)?));
    }

    populate(&mut world)?;
    tracing::info!(
        "Hearth starting: seed {}, {} device(s), {} rule(s)",
        args.seed,
        world.state().devices.len(),
        world.rules().rule_count()
    );

    let world = if args.llm {
        run_with_llm(world, &args)?
    } else {
        run_scripted(world, args.ticks)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(world.state())?);
    } else {
        let summary = summarize(&world, args.seed);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

/// A small household with a few natural rivalries
fn populate(world: &mut World) -> Result<()> {
    let devices = [
        ("thermostat", DeviceKind::Thermostat, RoomId::LivingRoom),
        ("space_heater", DeviceKind::Heater, RoomId::LivingRoom),
        ("living_speaker", DeviceKind::Speaker, RoomId::LivingRoom),
        ("kitchen_assistant", DeviceKind::Assistant, RoomId::Kitchen),
        ("bedside_lamp", DeviceKind::Light, RoomId::Bedroom),
        ("sleep_monitor", DeviceKind::HealthMonitor, RoomId::Bedroom),
        ("bath_humidifier", DeviceKind::Humidifier, RoomId::Bathroom),
        ("bath_fan", DeviceKind::Dehumidifier, RoomId::Bathroom),
        ("desk_lamp", DeviceKind::Light, RoomId::Office),
        ("office_ac", DeviceKind::AirConditioner, RoomId::Office),
    ];
    for (id, kind, room) in devices {
        world.add_device(DeviceRuntime::new(id, kind, room))?;
    }
    world.add_rate_constraint(&DeviceId::from("bedside_lamp"), ActionKind::Brighten, 100.0)?;
    world.add_rate_constraint(&DeviceId::from("living_speaker"), ActionKind::PlayMusic, 8.0)?;
    Ok(())
}

/// Deterministic headless loop: plan, mediate, tick
fn run_scripted(mut world: World, ticks: u64) -> World {
    let planner = ScriptedPlanner::new(world.state().seed).with_thresholds(world.config().health.clone());
    for _ in 0..ticks {
        let plans: Vec<_> = ProposalRequest::for_all(&world)
            .iter()
            .map(|request| planner.plan(request))
            .filter(|plan| !plan.actions.is_empty())
            .collect();
        if !plans.is_empty() {
            world.apply_actions(&plans);
        }
        let report = world.step();
        if let Some(event) = report.forced_event {
            tracing::info!("Tick {}: director forced {}", report.tick, event.as_str());
        }
    }
    world
}

fn run_with_llm(world: World, args: &Args) -> Result<World> {
    let planner = LlmPlanner::from_env()?;
    let interval = Duration::from_millis(
        args.interval_ms
            .unwrap_or(world.config().tick_interval_ms)
            .max(1),
    );

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(async {
        let handle = Runtime::new(world, planner)
            .with_interval(interval)
            .spawn(Some(args.ticks));
        handle.join().await
    })
}

fn summarize(world: &World, seed: u64) -> RunSummary {
    let state = world.state();
    let count = |kind: EventKind| state.event_log.of_kind(kind).count();
    RunSummary {
        seed,
        ticks: state.tick,
        health: state.health,
        conflicts_resolved: count(EventKind::ConflictResolved),
        rules_fired: count(EventKind::RuleFired),
        alarms: count(EventKind::Alarm),
        system_errors: count(EventKind::SystemError),
        causal_links: state.causal_links.len(),
    }
}
