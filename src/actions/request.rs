//! Proposal wire format and its validated, resolved form

use serde::{Deserialize, Serialize};

use crate::actions::catalog::ActionKind;
use crate::core::error::{HearthError, Result};
use crate::core::types::{DeviceId, RoomId, Variable};

/// Numeric arguments a planner may attach to an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionArgs {
    /// Signed change to the targeted variable
    pub delta: Option<f64>,
    /// Target room; defaults to the device's own room
    pub room: Option<RoomId>,
    /// Declared power demand (fraction of capacity)
    pub power: Option<f64>,
}

/// One `{name, args}` action as produced by a planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    #[serde(default)]
    pub args: ActionArgs,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: ActionArgs::default(),
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.args.delta = Some(delta);
        self
    }

    pub fn in_room(mut self, room: RoomId) -> Self {
        self.args.room = Some(room);
        self
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.args.power = Some(power);
        self
    }
}

/// A device's proposals for one tick plus its free-text rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicePlan {
    pub device_id: DeviceId,
    pub actions: Vec<ActionRequest>,
    #[serde(default)]
    pub rationale: String,
}

impl DevicePlan {
    pub fn new(device_id: impl Into<DeviceId>, actions: Vec<ActionRequest>) -> Self {
        Self {
            device_id: device_id.into(),
            actions,
            rationale: String::new(),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}

/// A validated action bound to a device, room and variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub device_id: DeviceId,
    pub kind: ActionKind,
    pub room: RoomId,
    pub variable: Variable,
    pub delta: f64,
    pub power: f64,
}

impl ProposedAction {
    /// Validate a request: the name must map to a known action and numeric
    /// args must be finite. A missing delta takes the catalog default.
    pub fn resolve(device_id: &DeviceId, home_room: RoomId, request: &ActionRequest) -> Result<Self> {
        let kind = ActionKind::parse(&request.name)
            .ok_or_else(|| HearthError::UnknownAction(request.name.clone()))?;

        let delta = request.args.delta.unwrap_or_else(|| kind.default_delta());
        if !delta.is_finite() {
            return Err(HearthError::UnknownAction(format!(
                "{}: non-finite delta",
                request.name
            )));
        }

        let power = request.args.power.unwrap_or_else(|| kind.default_power());
        if !power.is_finite() || power < 0.0 {
            return Err(HearthError::UnknownAction(format!(
                "{}: invalid power demand {}",
                request.name, power
            )));
        }

        Ok(Self {
            device_id: device_id.clone(),
            kind,
            room: request.args.room.unwrap_or(home_room),
            variable: kind.variable(),
            delta,
            power,
        })
    }
}
