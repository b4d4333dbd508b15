//! Diagnostic agent
//!
//! Bounded reasoning loop: a [`Planner`] picks the next tool call or a final
//! answer, the agent dispatches tool calls through the fixed allow-list and
//! feeds observations back. The host loop owns the step cap, timeouts,
//! retries and the read-only policy; the planner only proposes.
//!
//! [`DiagnosticAgent::analyze`] never fails. Every failure inside a run is
//! recovered into a `QueryAnalysis` with severity `error`.

pub mod planner;
mod policy;
pub mod prompt;
pub mod transcript;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::core::constants::{
    DEFAULT_MAX_STEPS, DEFAULT_STEP_TIMEOUT_SECS, DEFAULT_TOOL_TIMEOUT_SECS,
};
use crate::data::schema;
use crate::data::types::{QueryAnalysis, QueryMetadata};
use crate::domain::tools::{MetricTools, ToolCall, ToolError, ToolName};
use crate::utils::json::{extract_json_object, str_field};
use crate::utils::retry::{RetryPolicy, retry_with_backoff_async};

pub use planner::{
    ChatCompletionsPlanner, ChatPlannerConfig, HeuristicPlanner, Planner, PlannerAction,
    PlannerError,
};
pub use transcript::{Observation, Transcript, TranscriptEntry};

/// Root cause recorded when the final answer cannot be parsed
pub const ROOT_CAUSE_PARSE: &str = "JSON parsing error";
/// Root cause recorded when the step cap is reached
pub const ROOT_CAUSE_EXHAUSTED: &str = "Agent step budget exhausted";
/// Root cause recorded when the final answer breaks the read-only rules
pub const ROOT_CAUSE_POLICY: &str = "Policy violation";
/// Root cause recorded for any other failure inside the run
pub const ROOT_CAUSE_AGENT: &str = "Agent execution error";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub step_timeout: Duration,
    pub tool_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent reached the step limit of {0} without a final answer")]
    Exhausted(u32),

    #[error("Planner step {step} timed out after {timeout_ms}ms")]
    StepTimeout { step: u32, timeout_ms: u64 },

    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("{0}")]
    Parse(String),

    #[error("Final answer breaks read-only rules: {0}")]
    Policy(String),
}

impl AgentError {
    /// Terminal analysis describing this failure
    pub fn into_analysis(self, query_id: &str) -> QueryAnalysis {
        match self {
            Self::Parse(detail) => QueryAnalysis::error(
                query_id,
                format!("Failed to parse agent output: {}", detail),
                ROOT_CAUSE_PARSE,
            ),
            e @ Self::Exhausted(_) => {
                QueryAnalysis::error(query_id, e.to_string(), ROOT_CAUSE_EXHAUSTED)
            }
            e @ Self::Policy(_) => QueryAnalysis::error(query_id, e.to_string(), ROOT_CAUSE_POLICY),
            e => QueryAnalysis::error(
                query_id,
                format!("Analysis failed: {}", e),
                ROOT_CAUSE_AGENT,
            ),
        }
    }
}

/// Runs one bounded analysis per query
pub struct DiagnosticAgent {
    planner: Arc<dyn Planner>,
    tools: Arc<dyn MetricTools>,
    config: AgentConfig,
}

impl DiagnosticAgent {
    pub fn new(planner: Arc<dyn Planner>, tools: Arc<dyn MetricTools>, config: AgentConfig) -> Self {
        Self {
            planner,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Analyze one query, recovering every failure into an error analysis
    pub async fn analyze(&self, query: &QueryMetadata) -> QueryAnalysis {
        let query_id = query.query_id.as_str();
        match self.run(query_id).await {
            Ok(analysis) => {
                tracing::debug!(query_id, severity = %analysis.severity, "Analysis accepted");
                analysis
            }
            Err(e) => {
                tracing::warn!(
                    query_id,
                    planner = self.planner.planner_name(),
                    error = %e,
                    "Analysis recovered from failure"
                );
                e.into_analysis(query_id)
            }
        }
    }

    /// The reasoning loop; tool calls are issued strictly one at a time
    pub async fn run(&self, query_id: &str) -> Result<QueryAnalysis, AgentError> {
        let mut transcript = Transcript::new(query_id);

        for step in 1..=self.config.max_steps {
            let action = tokio::time::timeout(
                self.config.step_timeout,
                self.planner.next(&transcript),
            )
            .await
            .map_err(|_| AgentError::StepTimeout {
                step,
                timeout_ms: self.config.step_timeout.as_millis() as u64,
            })??;

            match action {
                PlannerAction::FinalAnswer(text) => {
                    tracing::debug!(query_id, step, "Final answer received");
                    return accept_answer(query_id, &text, &transcript);
                }
                PlannerAction::CallTool {
                    id,
                    name,
                    arguments,
                } => {
                    tracing::debug!(query_id, step, tool = %name, "Tool call");
                    let observation = self
                        .observe(query_id, &name, arguments.clone(), &transcript)
                        .await?;
                    if let Observation::Error(message) = &observation {
                        tracing::debug!(query_id, step, tool = %name, error = %message, "Tool observation error");
                    }
                    transcript.push(TranscriptEntry {
                        step,
                        call_id: id.unwrap_or_else(|| format!("call_{}", step)),
                        tool: name,
                        arguments,
                        observation,
                    });
                }
            }
        }

        Err(AgentError::Exhausted(self.config.max_steps))
    }

    /// Dispatch one tool call and turn its outcome into an observation.
    ///
    /// Unknown tools, bad arguments and missing records become observation
    /// errors. Validation failures and exhausted retries abort the run.
    async fn observe(
        &self,
        query_id: &str,
        name: &str,
        arguments: Value,
        transcript: &Transcript,
    ) -> Result<Observation, AgentError> {
        let call = match resolve_call(query_id, name, arguments, transcript) {
            Ok(call) => call,
            Err(e) => return Ok(Observation::Error(e.to_string())),
        };

        let tools = &self.tools;
        let call = &call;
        let timeout = self.config.tool_timeout;
        let result = retry_with_backoff_async(self.config.retry, ToolError::is_transient, move || async move {
            match tokio::time::timeout(timeout, tools.invoke(call)).await {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    tool: call.name(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            }
        })
        .await;

        match result {
            Ok((value, _)) => Ok(Observation::Record(value)),
            Err((e, _)) if e.is_observable() => Ok(Observation::Error(e.to_string())),
            Err((e, attempts)) => {
                tracing::warn!(query_id, tool = %call.name(), attempts, error = %e, "Tool call failed");
                Err(AgentError::Tool(e))
            }
        }
    }
}

/// Bind a planner's tool request to the allow-list and the run's query.
///
/// A missing `query_id` defaults to the run's; a different one is refused.
/// A missing `warehouse_name` is taken from an earlier history observation.
fn resolve_call(
    query_id: &str,
    name: &str,
    mut arguments: Value,
    transcript: &Transcript,
) -> Result<ToolCall, ToolError> {
    let tool: ToolName = name.parse()?;
    let Some(args) = arguments.as_object_mut() else {
        return Err(ToolError::InvalidArguments {
            tool,
            message: "arguments must be a JSON object".to_string(),
        });
    };

    if args.get("query_id").is_none_or(Value::is_null) {
        args.insert("query_id".to_string(), Value::String(query_id.to_string()));
    }

    if tool == ToolName::GetWarehouseMetric
        && args
            .get("warehouse_name")
            .and_then(Value::as_str)
            .is_none_or(|s| s.trim().is_empty())
    {
        let warehouse = transcript
            .last_record(ToolName::GetQueryHistory)
            .and_then(|history| str_field(history, "warehouse_name"))
            .ok_or_else(|| ToolError::InvalidArguments {
                tool,
                message: "warehouse_name is required; call get_query_history first to learn it"
                    .to_string(),
            })?;
        args.insert(
            "warehouse_name".to_string(),
            Value::String(warehouse.to_string()),
        );
    }

    let call = ToolCall::parse(tool, &arguments)?;
    if call.query_id() != query_id {
        return Err(ToolError::InvalidArguments {
            tool,
            message: format!(
                "query_id '{}' is outside this run; only '{}' may be inspected",
                call.query_id(),
                query_id
            ),
        });
    }
    Ok(call)
}

/// Parse and gate the planner's final answer
fn accept_answer(
    query_id: &str,
    text: &str,
    transcript: &Transcript,
) -> Result<QueryAnalysis, AgentError> {
    let json = extract_json_object(text)
        .ok_or_else(|| AgentError::Parse("no JSON object in final answer".to_string()))?;
    let mut value: Value =
        serde_json::from_str(json).map_err(|e| AgentError::Parse(e.to_string()))?;
    let Some(fields) = value.as_object_mut() else {
        return Err(AgentError::Parse("final answer is not a JSON object".to_string()));
    };

    if fields.get("query_id").is_none_or(Value::is_null) {
        fields.insert("query_id".to_string(), Value::String(query_id.to_string()));
    }
    let history_text = transcript
        .last_record(ToolName::GetQueryHistory)
        .and_then(|history| str_field(history, "query_text"));
    match history_text {
        Some(text) => {
            fields.insert("query_text".to_string(), Value::String(text.to_string()));
        }
        None => {
            fields
                .entry("query_text")
                .or_insert_with(|| Value::String(String::new()));
        }
    }

    let analysis: QueryAnalysis =
        schema::parse(value).map_err(|e| AgentError::Parse(e.to_string()))?;
    schema::ensure_query_id(&analysis, query_id).map_err(|e| AgentError::Parse(e.to_string()))?;
    policy::check(&analysis).map_err(AgentError::Policy)?;
    Ok(analysis)
}
