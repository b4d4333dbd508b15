//! In-memory metric source with keyed lookup
//!
//! Payloads are registered per query id (and per warehouse for warehouse
//! metrics). Lookups for unregistered keys return `None`, which the tool
//! service surfaces as `NotFound`.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{MetricSource, SourceError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SourceKey {
    History(String),
    Profile(String),
    Storage(String),
    Warehouse { query_id: String, warehouse: String },
}

/// Keyed in-memory payload store
///
/// `fail_next` makes the next N lookups report the backend as unavailable.
#[derive(Default)]
pub struct InMemoryMetricSource {
    payloads: DashMap<SourceKey, Value>,
    pending_failures: AtomicU32,
}

impl InMemoryMetricSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_history(&self, query_id: &str, payload: Value) {
        self.payloads
            .insert(SourceKey::History(query_id.to_string()), payload);
    }

    pub fn insert_profile(&self, query_id: &str, payload: Value) {
        self.payloads
            .insert(SourceKey::Profile(query_id.to_string()), payload);
    }

    pub fn insert_storage(&self, query_id: &str, payload: Value) {
        self.payloads
            .insert(SourceKey::Storage(query_id.to_string()), payload);
    }

    pub fn insert_warehouse(&self, query_id: &str, warehouse: &str, payload: Value) {
        self.payloads.insert(
            SourceKey::Warehouse {
                query_id: query_id.to_string(),
                warehouse: warehouse.to_string(),
            },
            payload,
        );
    }

    /// Make the next `count` lookups fail with a transient error
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn lookup(&self, key: SourceKey) -> Result<Option<Value>, SourceError> {
        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SourceError::unavailable(
                self.source_name(),
                "injected failure",
            ));
        }
        Ok(self.payloads.get(&key).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl MetricSource for InMemoryMetricSource {
    async fn query_history(&self, query_id: &str) -> Result<Option<Value>, SourceError> {
        self.lookup(SourceKey::History(query_id.to_string()))
    }

    async fn query_profile(&self, query_id: &str) -> Result<Option<Value>, SourceError> {
        self.lookup(SourceKey::Profile(query_id.to_string()))
    }

    async fn table_storage(&self, query_id: &str) -> Result<Option<Value>, SourceError> {
        self.lookup(SourceKey::Storage(query_id.to_string()))
    }

    async fn warehouse(
        &self,
        query_id: &str,
        warehouse_name: &str,
    ) -> Result<Option<Value>, SourceError> {
        self.lookup(SourceKey::Warehouse {
            query_id: query_id.to_string(),
            warehouse: warehouse_name.to_string(),
        })
    }

    fn source_name(&self) -> &'static str {
        "memory"
    }
}
