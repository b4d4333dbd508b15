//! Shared record types
//!
//! Every component exchanges these types: the metric tools return them, the
//! agent reads them as observations and emits a `QueryAnalysis`, and the
//! orchestrator checkpoints a `WorkflowState`.

mod analysis;
mod metadata;
mod metrics;
mod workflow;

pub use analysis::{QueryAnalysis, Severity};
pub use metadata::{QueryMetadata, thread_id_for};
pub use metrics::{
    HashJoinOperator, JoinType, Operator, PartitionPruning, QueryHistoryRecord, QueryProfile,
    TableScanOperator, TableStorage, TableStorageMetric, WarehouseMetric,
};
pub use workflow::{WorkflowPhase, WorkflowState};
