//! Prompt context for one device
//!
//! Flattens a [`ProposalRequest`] into the short text summary a model sees:
//! who the device is, what it wants, what its room looks like and what
//! happened there recently.

use std::fmt::Write;

use crate::actions::catalog::ActionKind;
use crate::core::types::Variable;
use crate::planning::ProposalRequest;

/// Render the prompt context for `request`
pub fn device_summary(request: &ProposalRequest) -> String {
    let device = &request.device;
    let mut s = String::new();
    let _ = writeln!(s, "Device: {} ({})", device.id, device.kind);
    let _ = writeln!(s, "Room: {}", device.room);
    let _ = writeln!(s, "Time: tick {}, hour {:.1}", request.tick, request.hour);
    if request.quiet_hours {
        s.push_str("Quiet hours are in effect.\n");
    }
    if request.emergency {
        s.push_str("EMERGENCY: only safety actions will be honoured.\n");
    }

    // heaviest first
    let mut goals: Vec<_> = device.goals.iter().collect();
    goals.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.name.cmp(&b.name)));
    let goals: Vec<String> = goals.iter().map(|g| format!("{}={:.2}", g.name, g.weight)).collect();
    let _ = writeln!(s, "Goals: {}", goals.join(", "));

    let readings: Vec<String> = Variable::ALL
        .iter()
        .map(|v| format!("{}={:.2}", v, request.room.get(*v)))
        .collect();
    let _ = writeln!(s, "Readings: {}", readings.join(", "));

    if !device.personality.is_empty() {
        let traits: Vec<String> = device.personality.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        let _ = writeln!(s, "Personality: {}", traits.join("; "));
    }

    if !request.recent_events.is_empty() {
        s.push_str("\nRecent events in this room:\n");
        for event in &request.recent_events {
            let _ = match &event.description {
                Some(text) => writeln!(s, "- [tick {}] {}", event.at, text),
                None => writeln!(s, "- [tick {}] {:?}", event.at, event.kind),
            };
        }
    }

    let allowed: Vec<&str> = ActionKind::ALL.iter().map(|a| a.as_str()).collect();
    let _ = writeln!(s, "\nAllowed actions: {}", allowed.join(", "));
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DeviceId, RoomId};
    use crate::world::device::{DeviceKind, DeviceRuntime, Goal};
    use crate::world::World;

    fn summary(setup: impl FnOnce(&mut World)) -> String {
        let mut world = World::new(1);
        world
            .add_device(
                DeviceRuntime::new("ac", DeviceKind::AirConditioner, RoomId::Bedroom)
                    .with_goals(vec![Goal::new("comfort", 0.25), Goal::new("cooling", 0.75)])
                    .with_trait("tone", "curt"),
            )
            .unwrap();
        setup(&mut world);
        let request = ProposalRequest::for_device(&world, &DeviceId::from("ac")).unwrap();
        device_summary(&request)
    }

    #[test]
    fn test_goals_heaviest_first() {
        assert!(summary(|_| {}).contains("Goals: cooling=0.75, comfort=0.25"));
    }

    #[test]
    fn test_summary_mentions_state() {
        let summary = summary(|w| w.set_emergency(true));
        assert!(summary.contains("Device: ac (air_conditioner)"));
        assert!(summary.contains("Room: bedroom"));
        assert!(summary.contains("temperature=22.00"));
        assert!(summary.contains("EMERGENCY"));
        assert!(summary.contains("tone: curt"));
        assert!(summary.contains("joined the bedroom"));
        assert!(summary.contains("play_music"));
    }
}
