//! Durable workflow envelope stored in the checkpoint store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::QueryAnalysis;
use super::metadata::QueryMetadata;

/// Lifecycle phase of a query workflow
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowPhase {
    Pending,
    Analyzing,
    Completed,
    Failed,
}

impl WorkflowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one query's workflow
///
/// `analysis` is `None` until a node produces one. `completed_nodes` lists the
/// nodes that have already committed, in order, so nodes appended after the
/// analyzer fit in the same envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub thread_id: String,
    pub query: QueryMetadata,
    pub analysis: Option<QueryAnalysis>,
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub completed_nodes: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(query: QueryMetadata) -> Self {
        Self {
            thread_id: query.thread_id(),
            query,
            analysis: None,
            phase: WorkflowPhase::Pending,
            completed_nodes: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Move to `phase`, stamping the update time
    pub fn transition(&mut self, phase: WorkflowPhase) {
        self.phase = phase;
        self.updated_at = Utc::now();
    }

    pub fn has_completed(&self, node: &str) -> bool {
        self.completed_nodes.iter().any(|n| n == node)
    }
}
