//! Turn model output into a device plan
//!
//! The model is asked for a bare JSON object but frequently wraps it in
//! prose or code fences. Only the outermost `{...}` is parsed. Action names
//! are not checked here; unknown ones are rejected when the plan is applied.

use serde::Deserialize;

use crate::actions::request::{ActionRequest, DevicePlan};
use crate::core::error::{HearthError, Result};
use crate::core::types::DeviceId;

/// A device gets at most this many actions per plan
pub const MAX_ACTIONS: usize = 3;

#[derive(Debug, Deserialize)]
struct PlanResponse {
    #[serde(default)]
    actions: Vec<ActionRequest>,
    #[serde(default)]
    rationale: String,
}

/// Parse a completion into a plan owned by `device_id`
pub fn parse_plan(device_id: &DeviceId, response: &str) -> Result<DevicePlan> {
    let json = extract_json(response)?;
    let parsed: PlanResponse = serde_json::from_str(json).map_err(|e| {
        HearthError::LlmError(format!("Failed to parse plan: {} - Response: {}", e, response))
    })?;

    let mut actions = parsed.actions;
    if actions.len() > MAX_ACTIONS {
        tracing::debug!(
            "{} proposed {} actions; keeping the first {}",
            device_id,
            actions.len(),
            MAX_ACTIONS
        );
        actions.truncate(MAX_ACTIONS);
    }

    Ok(DevicePlan::new(device_id.clone(), actions).with_rationale(parsed.rationale.trim()))
}

/// Extract the outermost JSON object from a response
pub fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| HearthError::LlmError("No JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| HearthError::LlmError("No closing brace found in response".into()))?;
    Ok(&response[start..=end])
}

/// System prompt for plan generation
pub const PLAN_SYSTEM_PROMPT: &str = r#"You are one smart device in a shared household.
Each turn you see your own room and goals and propose what to do next.
A mediator arbitrates between devices; safety limits are enforced no matter what you propose.

RULES:
- Propose at most 3 actions, usually 0 or 1.
- Use only the allowed action names listed in the context.
- "delta" is the signed change you want (degrees, lumens, decibels, %RH, or mood 0-1).
- "room" is optional and defaults to your own room.
- During quiet hours prefer dimming and quieting; during an emergency propose nothing unless you are a monitor.

OUTPUT FORMAT (JSON only, no explanation):
{
  "actions": [{"name": "action_name", "args": {"delta": 0.0}}],
  "rationale": "one short sentence"
}

Examples:
warm office, thermostat -> {"actions": [{"name": "cool", "args": {"delta": -1.0}}], "rationale": "Office is above the comfort band"}
dark living room at dusk, light -> {"actions": [{"name": "brighten", "args": {"delta": 150}}], "rationale": "Getting dark"}
nothing to do -> {"actions": [], "rationale": "Room is comfortable"}
"#;
