//! Async driver around the synchronous world
//!
//! One task owns the [`World`] and ticks it on a fixed wall-clock interval.
//! After every tick it spawns one proposal task per device; those tasks
//! report into a bounded inbox that the tick task drains at the start of
//! the next tick. A slow planner therefore never holds up the clock, and its
//! plan is mediated against whatever the world looks like when it lands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::actions::request::DevicePlan;
use crate::core::error::{HearthError, Result};
use crate::core::types::{DeviceId, Tick};
use crate::planning::{ProposalRequest, ProposalSource};
use crate::world::{World, WorldState};

/// What a proposal task reports back
#[derive(Debug)]
pub enum InboxMessage {
    Plan(DevicePlan),
    Failed {
        device_id: DeviceId,
        planned_at: Tick,
        error: String,
    },
}

/// A world paired with the planner that feeds it
pub struct Runtime<P: ProposalSource> {
    world: World,
    planner: Arc<P>,
    interval: Duration,
    inbox_capacity: usize,
}

impl<P: ProposalSource> Runtime<P> {
    pub fn new(world: World, planner: P) -> Self {
        let interval = Duration::from_millis(world.config().tick_interval_ms.max(1));
        let inbox_capacity = world.config().inbox_capacity.max(1);
        Self {
            world,
            planner: Arc::new(planner),
            interval,
            inbox_capacity,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Start ticking on the current tokio runtime
    ///
    /// Runs until `max_ticks` ticks have completed or the handle asks it to
    /// stop; either way the owned world is handed back through `join`.
    pub fn spawn(self, max_ticks: Option<u64>) -> RuntimeHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(self.world.snapshot()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(max_ticks, snapshot_tx, shutdown_rx));
        RuntimeHandle {
            snapshots: snapshot_rx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        mut self,
        max_ticks: Option<u64>,
        snapshots: watch::Sender<Arc<WorldState>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> World {
        let (inbox_tx, mut inbox_rx) = mpsc::channel(self.inbox_capacity);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut completed = 0u64;

        tracing::info!(
            "Runtime started: {} device(s), {:?} per tick",
            self.world.state().devices.len(),
            self.interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            self.drain_inbox(&mut inbox_rx);
            let report = self.world.step();
            let _ = snapshots.send(Arc::new(self.world.snapshot()));
            self.dispatch_proposals(&inbox_tx);

            completed += 1;
            tracing::debug!("Tick {} done, health {:.3}", report.tick, report.health);
            if max_ticks.is_some_and(|max| completed >= max) {
                break;
            }
        }

        tracing::info!("Runtime stopped at tick {}", self.world.current_tick());
        self.world
    }

    fn drain_inbox(&mut self, inbox: &mut mpsc::Receiver<InboxMessage>) {
        let mut plans = Vec::new();
        while let Ok(message) = inbox.try_recv() {
            match message {
                InboxMessage::Plan(plan) => plans.push(plan),
                InboxMessage::Failed {
                    device_id,
                    planned_at,
                    error,
                } => {
                    tracing::warn!("Planner failed for {} at tick {}: {}", device_id, planned_at, error);
                    self.world.record_system_error(
                        Some(device_id),
                        format!("Proposal generation failed (tick {}): {}", planned_at, error),
                    );
                }
            }
        }
        if !plans.is_empty() {
            self.world.apply_actions(&plans);
        }
    }

    fn dispatch_proposals(&self, inbox: &mpsc::Sender<InboxMessage>) {
        for request in ProposalRequest::for_all(&self.world) {
            let planner = Arc::clone(&self.planner);
            let sender = inbox.clone();
            tokio::spawn(async move {
                let device_id = request.device.id.clone();
                let planned_at = request.tick;
                let message = match planner.propose(request).await {
                    Ok(mut plan) => {
                        plan.device_id = device_id;
                        InboxMessage::Plan(plan)
                    }
                    Err(e) => InboxMessage::Failed {
                        device_id,
                        planned_at,
                        error: e.to_string(),
                    },
                };
                // Closed inbox means the runtime already stopped
                let _ = sender.send(message).await;
            });
        }
    }
}

/// Control surface for a spawned runtime
pub struct RuntimeHandle {
    snapshots: watch::Receiver<Arc<WorldState>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<World>,
}

impl RuntimeHandle {
    /// Read-only snapshots, published after every tick
    pub fn subscribe(&self) -> watch::Receiver<Arc<WorldState>> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> Arc<WorldState> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Ask the tick task to stop after the tick in progress
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait for the tick task and take the world back
    pub async fn join(self) -> Result<World> {
        self.task
            .await
            .map_err(|e| HearthError::PlannerError(format!("Runtime task failed: {}", e)))
    }
}
