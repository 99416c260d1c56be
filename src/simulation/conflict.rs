//! Conflict detection over one batch of proposed actions

use serde::Serialize;
use std::collections::BTreeMap;

use crate::actions::request::ProposedAction;
use crate::core::types::{RoomId, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// >5 high, >2 medium, otherwise low
    pub fn from_magnitude(max_delta: f64) -> Self {
        if max_delta > 5.0 {
            Severity::High
        } else if max_delta > 2.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Opposing effects on one variable
    Opposing(Variable),
    /// Combined power demand over capacity
    Resource,
}

impl ConflictType {
    /// `temperature_conflict`, `resource_conflict`, ...
    pub fn label(&self) -> String {
        match self {
            ConflictType::Opposing(variable) => format!("{}_conflict", variable.as_str()),
            ConflictType::Resource => "resource_conflict".into(),
        }
    }
}

/// Simultaneous claims on one room variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictRecord {
    pub room: RoomId,
    pub variable: Variable,
    pub contenders: Vec<ProposedAction>,
    pub conflict_type: ConflictType,
    pub severity: Severity,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictScan {
    pub conflicts: Vec<ConflictRecord>,
    /// Contending groups that agreed (same direction, within capacity)
    pub synergies: usize,
    /// Actions with no contender, in input order
    pub uncontested: Vec<ProposedAction>,
}

/// Group actions by (room, variable) and classify each group of two or more
pub fn detect_conflicts(actions: &[ProposedAction], power_capacity: f64) -> ConflictScan {
    let mut groups: BTreeMap<(RoomId, Variable), Vec<&ProposedAction>> = BTreeMap::new();
    for action in actions {
        groups
            .entry((action.room, action.variable))
            .or_default()
            .push(action);
    }

    let mut scan = ConflictScan::default();
    let mut contested = Vec::new();
    for ((room, variable), group) in groups {
        if group.len() < 2 {
            continue;
        }
        match classify(&group, power_capacity) {
            Some(conflict_type) => {
                let max_delta = group.iter().map(|a| a.delta.abs()).fold(0.0, f64::max);
                scan.conflicts.push(ConflictRecord {
                    room,
                    variable,
                    contenders: group.iter().map(|a| (*a).clone()).collect(),
                    conflict_type,
                    severity: Severity::from_magnitude(max_delta),
                });
                contested.push((room, variable));
            }
            None => scan.synergies += 1,
        }
    }

    scan.uncontested = actions
        .iter()
        .filter(|a| !contested.contains(&(a.room, a.variable)))
        .cloned()
        .collect();
    scan
}

fn classify(group: &[&ProposedAction], power_capacity: f64) -> Option<ConflictType> {
    let named_opposites = group
        .iter()
        .enumerate()
        .any(|(i, a)| group[i + 1..].iter().any(|b| a.kind.opposes(b.kind)));
    let rising = group.iter().any(|a| a.delta > 0.0);
    let falling = group.iter().any(|a| a.delta < 0.0);

    if named_opposites || (rising && falling) {
        return Some(ConflictType::Opposing(group[0].variable));
    }

    let demand: f64 = group.iter().map(|a| a.power).sum();
    if demand > power_capacity {
        return Some(ConflictType::Resource);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::catalog::ActionKind;
    use crate::core::types::DeviceId;

    fn action(device: &str, kind: ActionKind, room: RoomId, delta: f64, power: f64) -> ProposedAction {
        ProposedAction {
            device_id: DeviceId::from(device),
            kind,
            room,
            variable: kind.variable(),
            delta,
            power,
        }
    }

    #[test]
    fn test_opposing_actions_conflict() {
        let actions = vec![
            action("a", ActionKind::Cool, RoomId::Bedroom, -1.0, 0.6),
            action("b", ActionKind::Heat, RoomId::Bedroom, 2.0, 0.7),
            action("c", ActionKind::Brighten, RoomId::Bedroom, 100.0, 0.1),
        ];
        let scan = detect_conflicts(&actions, 1.0);
        assert_eq!(scan.conflicts.len(), 1);
        let conflict = &scan.conflicts[0];
        assert_eq!(conflict.conflict_type.label(), "temperature_conflict");
        assert_eq!(conflict.severity, Severity::Low);
        assert_eq!(conflict.contenders.len(), 2);
        assert_eq!(scan.uncontested.len(), 1);
        assert_eq!(scan.uncontested[0].kind, ActionKind::Brighten);
    }

    #[test]
    fn test_resource_conflict() {
        let actions = vec![
            action("a", ActionKind::Cool, RoomId::Office, -1.0, 0.6),
            action("b", ActionKind::Cool, RoomId::Office, -2.0, 0.6),
        ];
        let scan = detect_conflicts(&actions, 1.0);
        assert_eq!(scan.conflicts[0].conflict_type, ConflictType::Resource);
        assert_eq!(scan.synergies, 0);
    }

    #[test]
    fn test_agreeing_actions_are_synergy() {
        let actions = vec![
            action("a", ActionKind::Dim, RoomId::Office, -50.0, 0.05),
            action("b", ActionKind::Dim, RoomId::Office, -80.0, 0.05),
        ];
        let scan = detect_conflicts(&actions, 1.0);
        assert!(scan.conflicts.is_empty());
        assert_eq!(scan.synergies, 1);
        assert_eq!(scan.uncontested.len(), 2);
    }

    #[test]
    fn test_different_rooms_never_conflict() {
        let actions = vec![
            action("a", ActionKind::Cool, RoomId::Office, -1.0, 0.6),
            action("b", ActionKind::Heat, RoomId::Kitchen, 1.0, 0.7),
        ];
        assert!(detect_conflicts(&actions, 1.0).conflicts.is_empty());
    }

    #[test]
    fn test_severity_from_largest_delta() {
        let actions = vec![
            action("a", ActionKind::PlayMusic, RoomId::LivingRoom, 20.0, 0.2),
            action("b", ActionKind::Quiet, RoomId::LivingRoom, -3.0, 0.05),
        ];
        let scan = detect_conflicts(&actions, 1.0);
        assert_eq!(scan.conflicts[0].severity, Severity::High);
        assert_eq!(Severity::from_magnitude(3.0), Severity::Medium);
        assert_eq!(Severity::from_magnitude(2.0), Severity::Low);
    }

    #[test]
    fn test_empty_input() {
        let scan = detect_conflicts(&[], 1.0);
        assert!(scan.conflicts.is_empty());
        assert!(scan.uncontested.is_empty());
    }
}
