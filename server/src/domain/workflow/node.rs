//! Workflow nodes

use std::sync::Arc;

use async_trait::async_trait;

use super::WorkflowError;
use crate::data::types::{QueryAnalysis, WorkflowState};
use crate::domain::agent::DiagnosticAgent;

/// One step of the workflow graph
///
/// A node reads the current state and produces the analysis carried forward.
/// Errors returned here escape the agent boundary and fail the workflow.
#[async_trait]
pub trait WorkflowNode: Send + Sync {
    /// Stable name recorded in `completed_nodes`
    fn name(&self) -> &'static str;

    async fn run(&self, state: &WorkflowState) -> Result<QueryAnalysis, WorkflowError>;
}

/// Runs the diagnostic agent for the state's query
pub struct AnalyzerNode {
    agent: Arc<DiagnosticAgent>,
}

impl AnalyzerNode {
    pub const NAME: &'static str = "query_analyzer";

    pub fn new(agent: Arc<DiagnosticAgent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl WorkflowNode for AnalyzerNode {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self, state: &WorkflowState) -> Result<QueryAnalysis, WorkflowError> {
        // Own task so a panic inside the agent surfaces as a node error
        let agent = self.agent.clone();
        let query = state.query.clone();
        tokio::spawn(async move { agent.analyze(&query).await })
            .await
            .map_err(|e| WorkflowError::node(Self::NAME, e.to_string()))
    }
}
