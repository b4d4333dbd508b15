//! OpenAI-compatible chat completions planner
//!
//! Replays the transcript as a chat conversation (system prompt, task turn,
//! then one assistant tool call and one tool result per entry) and asks the
//! model for the next step. Only the first tool call of a reply is taken;
//! calls are never fanned out.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Planner, PlannerAction, PlannerError};
use crate::core::secret::Secret;
use crate::domain::agent::prompt::SYSTEM_PROMPT;
use crate::domain::agent::transcript::Transcript;
use crate::domain::tools::ToolName;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct ChatPlannerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Secret,
    pub request_timeout: Duration,
}

pub struct ChatCompletionsPlanner {
    client: reqwest::Client,
    endpoint: String,
    config: ChatPlannerConfig,
}

impl ChatCompletionsPlanner {
    pub fn new(config: ChatPlannerConfig) -> Result<Self, PlannerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("QueryScope/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    fn build_request(&self, transcript: &Transcript) -> Value {
        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": build_messages(transcript),
            "tools": tool_definitions(),
            "tool_choice": "auto",
        })
    }
}

fn tool_definitions() -> Vec<Value> {
    ToolName::ALL
        .into_iter()
        .map(|tool| {
            let mut parameters = tool.input_schema();
            if let Some(obj) = parameters.as_object_mut() {
                obj.remove("$schema");
                obj.remove("title");
            }
            json!({
                "type": "function",
                "function": {
                    "name": tool.as_str(),
                    "description": tool.description(),
                    "parameters": parameters,
                }
            })
        })
        .collect()
}

fn build_messages(transcript: &Transcript) -> Vec<Value> {
    let mut messages = Vec::with_capacity(2 + transcript.len() * 2);
    messages.push(json!({ "role": "system", "content": SYSTEM_PROMPT }));
    messages.push(json!({ "role": "user", "content": transcript.task }));
    for entry in &transcript.entries {
        messages.push(json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": [{
                "id": entry.call_id,
                "type": "function",
                "function": {
                    "name": entry.tool,
                    "arguments": entry.arguments.to_string(),
                }
            }]
        }));
        messages.push(json!({
            "role": "tool",
            "tool_call_id": entry.call_id,
            "content": entry.observation.to_content(),
        }));
    }
    messages
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn parse_response(response: ChatResponse) -> Result<PlannerAction, PlannerError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| PlannerError::InvalidResponse("no choices in response".to_string()))?;

    if let Some(call) = message.tool_calls.into_iter().next() {
        // Unparseable arguments are passed through as a string; the agent
        // reports them back as an argument error
        let arguments = if call.function.arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments))
        };
        return Ok(PlannerAction::CallTool {
            id: Some(call.id),
            name: call.function.name,
            arguments,
        });
    }

    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(PlannerAction::FinalAnswer(content)),
        _ => Err(PlannerError::InvalidResponse(
            "reply has neither tool calls nor content".to_string(),
        )),
    }
}

#[async_trait]
impl Planner for ChatCompletionsPlanner {
    async fn next(&self, transcript: &Transcript) -> Result<PlannerAction, PlannerError> {
        let body = self.build_request(transcript);
        tracing::debug!(
            model = %self.config.model,
            entries = transcript.len(),
            "Requesting next step"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.config.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: String = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            return Err(PlannerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = resp
            .json()
            .await
            .map_err(|e| PlannerError::InvalidResponse(e.to_string()))?;
        parse_response(response)
    }

    fn planner_name(&self) -> &'static str {
        "chat"
    }
}
