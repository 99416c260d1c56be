//! Deterministic rule-of-thumb planner
//!
//! Each device kind looks at its own room and proposes at most one action.
//! Magnitudes carry a small seeded jitter so runs differ across seeds but
//! repeat exactly for the same seed, tick and device.

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::actions::catalog::ActionKind;
use crate::actions::request::{ActionRequest, DevicePlan};
use crate::core::config::HealthThresholds;
use crate::core::error::Result;
use crate::core::rng::ParkMiller;
use crate::core::types::Variable;
use crate::planning::{ProposalRequest, ProposalSource};
use crate::world::device::DeviceKind;

/// A candidate action and how badly the room wants it
#[derive(Debug, Clone, Copy)]
struct Candidate {
    action: ActionKind,
    urgency: f64,
    reason: &'static str,
}

impl Candidate {
    fn new(action: ActionKind, urgency: f64, reason: &'static str) -> Self {
        Self {
            action,
            urgency,
            reason,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPlanner {
    seed: u64,
    thresholds: HealthThresholds,
}

impl ScriptedPlanner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            thresholds: HealthThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Plan synchronously; the same request always yields the same plan
    pub fn plan(&self, request: &ProposalRequest) -> DevicePlan {
        let device_id = request.device.id.clone();
        let mut candidates = self.candidates(request);
        candidates.retain(|c| c.urgency > 0.0);

        let Some(best) = candidates
            .into_iter()
            .max_by_key(|c| (OrderedFloat(c.urgency), std::cmp::Reverse(c.action)))
        else {
            return DevicePlan::new(device_id, Vec::new()).with_rationale("Nothing to do");
        };

        let mut rng = self.rng_for(request);
        let scale = rng.gen_range(0.75..1.25);
        let delta = best.action.default_delta() * scale;
        DevicePlan::new(device_id, vec![ActionRequest::new(best.action.as_str()).with_delta(delta)])
            .with_rationale(best.reason)
    }

    fn rng_for(&self, request: &ProposalRequest) -> ParkMiller {
        // FNV-1a keeps the per-device stream stable across platforms
        let device_hash = request
            .device
            .id
            .as_str()
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
                (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
            });
        let seed = self
            .seed
            .wrapping_mul(31)
            .wrapping_add(request.tick)
            .wrapping_mul(31)
            .wrapping_add(device_hash);
        let mut rng = ParkMiller::new(seed);
        rng.next();
        rng
    }

    fn candidates(&self, request: &ProposalRequest) -> Vec<Candidate> {
        let t = &self.thresholds;
        let room = &request.room;
        let temperature = room.get(Variable::Temperature);
        let lumens = room.get(Variable::Lumens);
        let noise = room.get(Variable::Noise);
        let humidity = room.get(Variable::Humidity);
        let mood = room.get(Variable::MoodScore);
        let (comfort_low, comfort_high) = t.temperature_comfort;
        let (humid_low, humid_high) = t.humidity_comfort;

        if request.emergency && request.device.kind != DeviceKind::HealthMonitor {
            return Vec::new();
        }

        match request.device.kind {
            DeviceKind::Thermostat => vec![
                Candidate::new(ActionKind::Cool, temperature - comfort_high, "Room is warmer than comfortable"),
                Candidate::new(ActionKind::Heat, comfort_low - temperature, "Room is colder than comfortable"),
            ],
            DeviceKind::Heater => vec![Candidate::new(
                ActionKind::Heat,
                (comfort_low + 2.0) - temperature,
                "Keeping the room warm",
            )],
            DeviceKind::AirConditioner => vec![Candidate::new(
                ActionKind::Cool,
                temperature - (comfort_high - 1.0),
                "Bringing the temperature down",
            )],
            DeviceKind::Light if request.quiet_hours => vec![Candidate::new(
                ActionKind::Dim,
                (lumens - t.lumens_night_max) / 100.0,
                "Dimming for the night",
            )],
            DeviceKind::Light => vec![Candidate::new(
                ActionKind::Brighten,
                (450.0 - lumens) / 100.0,
                "Room could use more light",
            )],
            DeviceKind::Speaker if request.quiet_hours => vec![Candidate::new(
                ActionKind::Quiet,
                (noise - t.noise_quiet_hours_max) / 10.0,
                "Keeping it down during quiet hours",
            )],
            DeviceKind::Speaker => vec![
                Candidate::new(ActionKind::PlayMusic, (0.6 - mood) * 2.0, "Music to lift the mood"),
                Candidate::new(ActionKind::Quiet, (noise - t.noise_comfort_max) / 10.0, "Too loud in here"),
            ],
            DeviceKind::Humidifier => vec![Candidate::new(
                ActionKind::Humidify,
                (humid_low + 5.0 - humidity) / 5.0,
                "Air is dry",
            )],
            DeviceKind::Dehumidifier => vec![Candidate::new(
                ActionKind::Dehumidify,
                (humidity - (humid_high - 5.0)) / 5.0,
                "Air is damp",
            )],
            DeviceKind::HealthMonitor => {
                let night_glare = if request.quiet_hours {
                    (lumens - t.lumens_night_max) / 100.0
                } else {
                    0.0
                };
                let urgency = if request.emergency {
                    night_glare.max(1.0)
                } else {
                    night_glare
                };
                vec![Candidate::new(ActionKind::Alert, urgency, "Light level is unsafe for rest")]
            }
            DeviceKind::Assistant => vec![
                Candidate::new(ActionKind::Soothe, (0.6 - mood) * 5.0, "Household seems down"),
                Candidate::new(
                    ActionKind::Nag,
                    if request.quiet_hours { 0.0 } else { mood - 0.95 },
                    "A gentle reminder",
                ),
            ],
        }
    }
}

impl ProposalSource for ScriptedPlanner {
    async fn propose(&self, request: ProposalRequest) -> Result<DevicePlan> {
        Ok(self.plan(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DeviceId, RoomId};
    use crate::world::device::DeviceRuntime;
    use crate::world::World;

    fn request(kind: DeviceKind, room: RoomId, setup: impl FnOnce(&mut World)) -> ProposalRequest {
        let mut world = World::new(8);
        world.add_device(DeviceRuntime::new("dev", kind, room)).unwrap();
        setup(&mut world);
        ProposalRequest::for_device(&world, &DeviceId::from("dev")).unwrap()
    }

    #[test]
    fn test_same_inputs_same_plan() {
        let req = request(DeviceKind::Light, RoomId::Office, |_| {});
        let planner = ScriptedPlanner::new(99);
        assert_eq!(planner.plan(&req), planner.plan(&req));
    }

    #[test]
    fn test_jitter_depends_on_seed() {
        let req = request(DeviceKind::Light, RoomId::Office, |_| {});
        let a = ScriptedPlanner::new(1).plan(&req);
        let b = ScriptedPlanner::new(2).plan(&req);
        assert_eq!(a.actions[0].name, "brighten");
        assert_eq!(b.actions[0].name, "brighten");
        assert_ne!(a.actions[0].args.delta, b.actions[0].args.delta);
    }

    #[test]
    fn test_thermostat_cools_hot_room() {
        let req = request(DeviceKind::Thermostat, RoomId::LivingRoom, |w| {
            w.set_value(RoomId::LivingRoom, Variable::Temperature, 25.5).unwrap();
        });
        let plan = ScriptedPlanner::new(4).plan(&req);
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].name, "cool");
        let delta = plan.actions[0].args.delta.unwrap();
        assert!((-1.25..=-0.75).contains(&delta));
    }

    #[test]
    fn test_comfortable_room_no_action() {
        let req = request(DeviceKind::Thermostat, RoomId::LivingRoom, |_| {});
        let plan = ScriptedPlanner::new(4).plan(&req);
        assert!(plan.actions.is_empty());
    }

    #[test]
    fn test_emergency_silences_all_but_monitor() {
        let speaker = request(DeviceKind::Speaker, RoomId::Kitchen, |w| w.set_emergency(true));
        assert!(ScriptedPlanner::new(1).plan(&speaker).actions.is_empty());

        let monitor = request(DeviceKind::HealthMonitor, RoomId::Kitchen, |w| w.set_emergency(true));
        assert_eq!(ScriptedPlanner::new(1).plan(&monitor).actions[0].name, "alert");
    }

    #[tokio::test]
    async fn test_propose_matches_plan() {
        let req = request(DeviceKind::Assistant, RoomId::Bedroom, |w| {
            w.set_value(RoomId::Bedroom, Variable::MoodScore, 0.3).unwrap();
        });
        let planner = ScriptedPlanner::new(5);
        let plan = planner.propose(req.clone()).await.unwrap();
        assert_eq!(plan, planner.plan(&req));
        assert_eq!(plan.actions[0].name, "soothe");
    }
}
