//! Data layer
//!
//! - `types` - Diagnostic records and the workflow envelope
//! - `schema` - Schema registry validating records at trust boundaries
//! - `source` - Raw metric sources (simulated and in-memory backends)
//! - `checkpoint` - Keyed workflow state storage

pub mod checkpoint;
pub mod schema;
pub mod source;
pub mod types;

pub use checkpoint::{CheckpointError, CheckpointStore, InMemoryCheckpointStore};
pub use schema::{Record, RecordKind, SchemaError};
pub use source::{InMemoryMetricSource, MetricSource, SimulatedMetricSource, SourceError};
