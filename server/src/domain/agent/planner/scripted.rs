//! Planner replaying a fixed list of actions

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use super::{Planner, PlannerAction, PlannerError};
use crate::domain::agent::transcript::Transcript;

pub struct ScriptedPlanner {
    actions: Mutex<VecDeque<PlannerAction>>,
    delay: Option<Duration>,
}

impl ScriptedPlanner {
    pub fn new(actions: Vec<PlannerAction>) -> Self {
        Self {
            actions: Mutex::new(actions.into()),
            delay: None,
        }
    }

    /// Sleep before answering each step
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call(name: &str, arguments: serde_json::Value) -> PlannerAction {
        PlannerAction::CallTool {
            id: None,
            name: name.to_string(),
            arguments,
        }
    }

    pub fn query_call(name: &str, query_id: &str) -> PlannerAction {
        Self::call(name, json!({ "query_id": query_id }))
    }

    pub fn answer(text: impl Into<String>) -> PlannerAction {
        PlannerAction::FinalAnswer(text.into())
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn next(&self, _transcript: &Transcript) -> Result<PlannerAction, PlannerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.actions
            .lock()
            .pop_front()
            .ok_or_else(|| PlannerError::InvalidResponse("script exhausted".to_string()))
    }

    fn planner_name(&self) -> &'static str {
        "scripted"
    }
}
