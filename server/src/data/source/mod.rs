//! Raw metric sources backing the tool service
//!
//! A source hands back untyped JSON payloads exactly as its backend reports
//! them. Payloads are untrusted: the tool service validates them against the
//! schema registry before anything reaches a caller.
//!
//! - `simulated` - Fixed fixtures, always succeeds (development backend)
//! - `memory` - Keyed in-memory payloads with genuine lookup

mod memory;
mod simulated;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::InMemoryMetricSource;
pub use simulated::SimulatedMetricSource;

#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// Backend could not be reached; worth retrying
    #[error("Metric backend {backend} is not available: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    /// Backend answered with an error
    #[error("Metric backend {backend} failed: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },
}

impl SourceError {
    pub fn unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            reason: reason.into(),
        }
    }

    pub fn backend(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Backend that sources raw diagnostic payloads
///
/// `Ok(None)` means no record exists for the identifier.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn query_history(&self, query_id: &str) -> Result<Option<Value>, SourceError>;

    async fn query_profile(&self, query_id: &str) -> Result<Option<Value>, SourceError>;

    async fn table_storage(&self, query_id: &str) -> Result<Option<Value>, SourceError>;

    async fn warehouse(
        &self,
        query_id: &str,
        warehouse_name: &str,
    ) -> Result<Option<Value>, SourceError>;

    /// Source name for logging
    fn source_name(&self) -> &'static str;
}
