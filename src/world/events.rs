//! Append-only, bounded event log
//!
//! The log is the only audit surface the engine exposes. Consumers tail it
//! by sequence number; entries are never edited once appended, only evicted
//! from the front when the log is full.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

use crate::core::types::{DeviceId, RoomId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SystemTick,
    SystemError,
    RuleFired,
    ConflictResolved,
    ActionApplied,
    Alarm,
    DeviceJoined,
    DeviceRemoved,
    RulePacksLoaded,
    EmergencyChanged,
    DirectorEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// Monotonic sequence number, assigned on append
    pub seq: u64,
    pub at: Tick,
    pub time_sec: u64,
    pub room: Option<RoomId>,
    pub device_id: Option<DeviceId>,
    pub kind: EventKind,
    pub data: Option<Value>,
    pub description: Option<String>,
}

impl WorldEvent {
    /// An unstamped event; the log assigns `seq`, the world assigns `at`
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: 0,
            time_sec: 0,
            room: None,
            device_id: None,
            kind,
            data: None,
            description: None,
        }
    }

    pub fn in_room(mut self, room: RoomId) -> Self {
        self.room = Some(room);
        self
    }

    pub fn by_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn stamped(mut self, at: Tick, time_sec: u64) -> Self {
        self.at = at;
        self.time_sec = time_sec;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<WorldEvent>,
    cap: usize,
    next_seq: u64,
}

impl EventLog {
    pub fn new(cap: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(cap.min(1024)),
            cap: cap.max(1),
            next_seq: 0,
        }
    }

    /// Append, evicting the oldest entries past capacity; returns the sequence number
    pub fn push(&mut self, mut event: WorldEvent) -> u64 {
        let seq = self.next_seq;
        event.seq = seq;
        self.next_seq += 1;
        self.events.push_back(event);
        while self.events.len() > self.cap {
            self.events.pop_front();
        }
        seq
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &WorldEvent> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&WorldEvent> {
        self.events.back()
    }

    /// Events with `seq >= from`, for consumers tailing the log
    pub fn since(&self, from: u64) -> impl Iterator<Item = &WorldEvent> {
        self.events.iter().filter(move |e| e.seq >= from)
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &WorldEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    /// Sequence number the next appended event will receive
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_assigns_sequence() {
        let mut log = EventLog::new(10);
        assert_eq!(log.push(WorldEvent::new(EventKind::SystemTick)), 0);
        assert_eq!(log.push(WorldEvent::new(EventKind::SystemTick)), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.next_seq(), 2);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut log = EventLog::new(3);
        for _ in 0..5 {
            log.push(WorldEvent::new(EventKind::SystemTick));
        }
        assert_eq!(log.len(), 3);
        let seqs: Vec<u64> = log.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        let newest: Vec<u64> = log.iter().rev().take(2).map(|e| e.seq).collect();
        assert_eq!(newest, vec![4, 3]);
    }

    #[test]
    fn test_tail_since() {
        let mut log = EventLog::new(100);
        for _ in 0..5 {
            log.push(WorldEvent::new(EventKind::SystemTick));
        }
        log.push(WorldEvent::new(EventKind::Alarm).in_room(RoomId::Kitchen));
        assert_eq!(log.since(4).count(), 2);
        assert_eq!(log.of_kind(EventKind::Alarm).count(), 1);
        assert_eq!(log.last().unwrap().room, Some(RoomId::Kitchen));
    }

    #[test]
    fn test_event_serializes_kind_in_snake_case() {
        let event = WorldEvent::new(EventKind::ConflictResolved).with_description("x");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "conflict_resolved");
        assert_eq!(json["description"], "x");
    }
}
