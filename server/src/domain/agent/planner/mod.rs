//! Reasoning capability behind the agent loop
//!
//! A planner looks at the transcript and picks the next action. It owns no
//! loop state: the agent enforces the step cap, the tool allow-list and the
//! timeouts.
//!
//! - `heuristic` - Deterministic rule-based planner (no credentials)
//! - `chat` - OpenAI-compatible chat completions planner

mod chat;
mod heuristic;
#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::transcript::Transcript;

pub use chat::{ChatCompletionsPlanner, ChatPlannerConfig};
pub use heuristic::HeuristicPlanner;

/// Next step chosen by a planner
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerAction {
    /// Invoke a tool; the name is checked against the allow-list by the agent
    CallTool {
        id: Option<String>,
        name: String,
        arguments: Value,
    },
    /// Raw final answer text, expected to hold a `QueryAnalysis` JSON object
    FinalAnswer(String),
}

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Planner request failed: {0}")]
    Request(String),

    #[error("Planner returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Planner returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for PlannerError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn next(&self, transcript: &Transcript) -> Result<PlannerAction, PlannerError>;

    /// Planner name for logging
    fn planner_name(&self) -> &'static str;
}
