//! Domain logic for query diagnostics
//!
//! - `tools` - Read-only metric tool contracts and the validating tool service
//! - `agent` - Bounded reasoning loop producing a `QueryAnalysis`
//! - `workflow` - Checkpointed state machine driving the agent to a verdict

pub mod agent;
pub mod tools;
pub mod workflow;

pub use agent::{AgentConfig, DiagnosticAgent, Planner};
pub use tools::{MetricToolService, MetricTools, ToolError, ToolName};
pub use workflow::{AnalyzerNode, Orchestrator, WorkflowError, WorkflowNode};
