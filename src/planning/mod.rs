//! Proposal sources: where device plans come from
//!
//! The engine never generates proposals itself. A [`ProposalSource`] is
//! handed a [`ProposalRequest`] (a device and what it can see of the world)
//! and answers asynchronously with a [`DevicePlan`].

pub mod scripted;

pub use scripted::ScriptedPlanner;

use serde::Serialize;
use std::future::Future;

use crate::actions::request::DevicePlan;
use crate::core::error::Result;
use crate::core::types::{DeviceId, Tick};
use crate::world::device::DeviceRuntime;
use crate::world::events::WorldEvent;
use crate::world::room::RoomState;
use crate::world::World;

/// How many recent events a planner sees about its own room
const RECENT_EVENTS: usize = 5;

/// Everything a planner is told about one device's situation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposalRequest {
    pub tick: Tick,
    pub seed: u64,
    pub hour: f64,
    pub quiet_hours: bool,
    pub emergency: bool,
    pub device: DeviceRuntime,
    pub room: RoomState,
    pub recent_events: Vec<WorldEvent>,
}

impl ProposalRequest {
    /// Snapshot the world from one device's point of view
    pub fn for_device(world: &World, device_id: &DeviceId) -> Option<Self> {
        let state = world.state();
        let device = state.device(device_id)?.clone();
        let room = state.room(device.room)?.clone();
        let mut recent_events: Vec<WorldEvent> = state
            .event_log
            .iter()
            .rev()
            .filter(|e| e.room == Some(device.room))
            .take(RECENT_EVENTS)
            .cloned()
            .collect();
        recent_events.reverse();

        Some(Self {
            tick: state.tick,
            seed: state.seed,
            hour: world.hour(),
            quiet_hours: world.in_quiet_hours(),
            emergency: state.policies.emergency,
            device,
            room,
            recent_events,
        })
    }

    /// One request per registered device, in device id order
    pub fn for_all(world: &World) -> Vec<Self> {
        world
            .state()
            .devices
            .keys()
            .filter_map(|id| Self::for_device(world, id))
            .collect()
    }
}

/// Produces a device's plan for one tick
///
/// Implementations may be slow (network calls); the runtime never waits
/// on them from inside a tick.
pub trait ProposalSource: Send + Sync + 'static {
    fn propose(&self, request: ProposalRequest) -> impl Future<Output = Result<DevicePlan>> + Send;
}
