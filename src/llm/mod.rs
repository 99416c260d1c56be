//! LLM-backed proposal source
//!
//! Each device is prompted with its own context and answers with a JSON
//! plan. The model only proposes; mediation and safety limits still decide
//! what happens.

pub mod client;
pub mod context;
pub mod parser;

pub use client::{ApiFormat, Completion, LlmClient};
pub use context::device_summary;
pub use parser::{extract_json, parse_plan};

use crate::actions::request::DevicePlan;
use crate::core::error::Result;
use crate::planning::{ProposalRequest, ProposalSource};

/// Asks a completion backend for each device's plan
pub struct LlmPlanner<C: Completion = LlmClient> {
    backend: C,
}

impl LlmPlanner<LlmClient> {
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(LlmClient::from_env()?))
    }
}

impl<C: Completion> LlmPlanner<C> {
    pub fn new(backend: C) -> Self {
        Self { backend }
    }
}

impl<C: Completion> ProposalSource for LlmPlanner<C> {
    async fn propose(&self, request: ProposalRequest) -> Result<DevicePlan> {
        let user_prompt = format!(
            "CONTEXT:\n{}\nPropose your plan for this tick as JSON:",
            device_summary(&request)
        );
        let response = self
            .backend
            .complete(parser::PLAN_SYSTEM_PROMPT, &user_prompt)
            .await?;
        let plan = parse_plan(&request.device.id, &response)?;
        tracing::debug!(
            "{} proposed {} action(s): {}",
            plan.device_id,
            plan.actions.len(),
            plan.rationale
        );
        Ok(plan)
    }
}
