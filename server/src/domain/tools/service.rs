//! Metric tool service over a raw metric source

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{MetricTools, ToolError, ToolName};
use crate::data::schema::{self, Record};
use crate::data::source::MetricSource;
use crate::data::types::{QueryHistoryRecord, QueryProfile, TableStorageMetric, WarehouseMetric};

/// Validating tool service
///
/// Raw payloads from the source are parsed against the schema registry and
/// checked for query_id echo-back. A payload that fails either check is
/// dropped and the call fails with `ToolError::Validation`.
#[derive(Clone)]
pub struct MetricToolService {
    source: Arc<dyn MetricSource>,
}

impl MetricToolService {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.source_name()
    }

    fn accept<T: Record>(&self, query_id: &str, payload: Option<Value>) -> Result<T, ToolError> {
        let value = payload.ok_or_else(|| ToolError::NotFound {
            kind: T::KIND,
            query_id: query_id.to_string(),
        })?;
        let record: T = schema::parse(value)
            .and_then(|record| schema::ensure_query_id(&record, query_id).map(|_| record))
            .map_err(|e| {
                tracing::warn!(
                    query_id,
                    source = self.source.source_name(),
                    error = %e,
                    "Rejected metric payload"
                );
                e
            })?;
        Ok(record)
    }
}

fn require_query_id(tool: ToolName, query_id: &str) -> Result<(), ToolError> {
    if query_id.trim().is_empty() {
        return Err(ToolError::InvalidArguments {
            tool,
            message: "query_id must not be empty".to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl MetricTools for MetricToolService {
    async fn get_query_history(&self, query_id: &str) -> Result<QueryHistoryRecord, ToolError> {
        require_query_id(ToolName::GetQueryHistory, query_id)?;
        tracing::debug!(query_id, "get_query_history");
        let payload = self.source.query_history(query_id).await?;
        self.accept(query_id, payload)
    }

    async fn get_query_profile(&self, query_id: &str) -> Result<QueryProfile, ToolError> {
        require_query_id(ToolName::GetQueryProfile, query_id)?;
        tracing::debug!(query_id, "get_query_profile");
        let payload = self.source.query_profile(query_id).await?;
        self.accept(query_id, payload)
    }

    async fn get_table_storage_metric(
        &self,
        query_id: &str,
    ) -> Result<TableStorageMetric, ToolError> {
        require_query_id(ToolName::GetTableStorageMetric, query_id)?;
        tracing::debug!(query_id, "get_table_storage_metric");
        let payload = self.source.table_storage(query_id).await?;
        self.accept(query_id, payload)
    }

    async fn get_warehouse_metric(
        &self,
        query_id: &str,
        warehouse_name: &str,
    ) -> Result<WarehouseMetric, ToolError> {
        require_query_id(ToolName::GetWarehouseMetric, query_id)?;
        if warehouse_name.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: ToolName::GetWarehouseMetric,
                message: "warehouse_name must not be empty".to_string(),
            });
        }
        tracing::debug!(query_id, warehouse_name, "get_warehouse_metric");
        let payload = self.source.warehouse(query_id, warehouse_name).await?;
        self.accept(query_id, payload)
    }
}
