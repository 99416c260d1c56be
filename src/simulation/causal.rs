//! Causal-chain heuristics: which recent action pushed a room into a hard rule

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::actions::catalog::ActionKind;
use crate::actions::request::ProposedAction;
use crate::core::types::{DeviceId, RoomId, Tick, Variable};

/// A hard rule firing attributed to an earlier applied action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalLink {
    pub tick: Tick,
    pub rule_id: String,
    pub room: RoomId,
    pub variable: Variable,
    pub device_id: DeviceId,
    pub action: ActionKind,
    pub ticks_apart: u64,
    /// 1.0 for same tick, falling linearly across the window
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct AppliedRecord {
    tick: Tick,
    device_id: DeviceId,
    action: ActionKind,
    room: RoomId,
    variable: Variable,
    delta: f64,
}

/// Recent applied actions, kept for `window` ticks
#[derive(Debug, Clone, Default)]
pub struct CausalTracker {
    window: u64,
    recent: VecDeque<AppliedRecord>,
}

impl CausalTracker {
    pub fn new(window: u64) -> Self {
        Self {
            window,
            recent: VecDeque::new(),
        }
    }

    pub fn record(&mut self, tick: Tick, action: &ProposedAction) {
        self.recent.push_back(AppliedRecord {
            tick,
            device_id: action.device_id.clone(),
            action: action.kind,
            room: action.room,
            variable: action.variable,
            delta: action.delta,
        });
        self.prune(tick);
    }

    /// Forget actions older than the window
    pub fn prune(&mut self, now: Tick) {
        while let Some(front) = self.recent.front() {
            if now.saturating_sub(front.tick) > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Attribute a hard rule firing to the most recent action on the same
    /// room variable, preferring larger moves on the same tick
    pub fn link(&self, rule_id: &str, room: RoomId, variable: Variable, now: Tick) -> Option<CausalLink> {
        let cause = self
            .recent
            .iter()
            .filter(|r| r.room == room && r.variable == variable)
            .filter(|r| now.saturating_sub(r.tick) <= self.window)
            .max_by(|a, b| {
                a.tick
                    .cmp(&b.tick)
                    .then_with(|| a.delta.abs().total_cmp(&b.delta.abs()))
            })?;

        let ticks_apart = now.saturating_sub(cause.tick);
        let confidence = 1.0 - ticks_apart as f64 / (self.window + 1) as f64;
        Some(CausalLink {
            tick: now,
            rule_id: rule_id.to_string(),
            room,
            variable,
            device_id: cause.device_id.clone(),
            action: cause.action,
            ticks_apart,
            confidence,
        })
    }
}

/// Append, evicting the oldest links past `cap`
pub fn push_link(links: &mut VecDeque<CausalLink>, link: CausalLink, cap: usize) {
    links.push_back(link);
    while links.len() > cap {
        links.pop_front();
    }
}
