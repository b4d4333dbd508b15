//! Workflow checkpoint storage
//!
//! Keyed by thread id (`query_<query_id>`), each entry holds one serialized
//! [`WorkflowState`]. Stores are injected into the orchestrator and shared by
//! all concurrent runs.

mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::data::types::{WorkflowPhase, WorkflowState};

pub use memory::InMemoryCheckpointStore;

#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Compare-and-swap lost: the stored phase is not the expected one
    #[error("Checkpoint conflict on {thread_id}: expected {}, found {}", phase_label(.expected), phase_label(.actual))]
    Conflict {
        thread_id: String,
        expected: Option<WorkflowPhase>,
        actual: Option<WorkflowPhase>,
    },

    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn phase_label(phase: &Option<WorkflowPhase>) -> &'static str {
    phase.map(|p| p.as_str()).unwrap_or("absent")
}

/// Concurrency-safe keyed store for workflow state
///
/// # Consistency Notes
///
/// `get_or_create` and `put` are atomic per key. `put` only commits when the
/// currently stored phase equals `expected` (`None` meaning no entry), so two
/// runs racing on the same phase transition cannot both win.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the state stored under `thread_id`
    async fn get(&self, thread_id: &str) -> Result<Option<WorkflowState>, CheckpointError>;

    /// Return the stored state, inserting `initial` first if the key is absent
    async fn get_or_create(
        &self,
        thread_id: &str,
        initial: WorkflowState,
    ) -> Result<WorkflowState, CheckpointError>;

    /// Commit `state` if the stored phase matches `expected`
    async fn put(
        &self,
        thread_id: &str,
        state: &WorkflowState,
        expected: Option<WorkflowPhase>,
    ) -> Result<(), CheckpointError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
