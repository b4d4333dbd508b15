//! Metric tool contracts
//!
//! The four read-only diagnostic operations, addressed by a closed set of
//! tool names. Each name is bound to its input shape and its output record;
//! names outside the set are rejected before anything is invoked.

mod service;

use std::str::FromStr;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::data::schema::{RecordKind, SchemaError};
use crate::data::source::SourceError;
use crate::data::types::{QueryHistoryRecord, QueryProfile, TableStorageMetric, WarehouseMetric};

pub use service::MetricToolService;

// ============================================================================
// TOOL NAMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    GetQueryHistory,
    GetQueryProfile,
    GetTableStorageMetric,
    GetWarehouseMetric,
}

impl ToolName {
    pub const ALL: [ToolName; 4] = [
        Self::GetQueryHistory,
        Self::GetQueryProfile,
        Self::GetTableStorageMetric,
        Self::GetWarehouseMetric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetQueryHistory => "get_query_history",
            Self::GetQueryProfile => "get_query_profile",
            Self::GetTableStorageMetric => "get_table_storage_metric",
            Self::GetWarehouseMetric => "get_warehouse_metric",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::GetQueryHistory => {
                "Fetch the execution history of a query: text, warehouse, elapsed time, bytes scanned, rows produced."
            }
            Self::GetQueryProfile => {
                "Fetch the operator-level execution profile of a query (table scans with partition pruning, hash joins with row counts)."
            }
            Self::GetTableStorageMetric => {
                "Fetch storage metrics for the tables a query touched: row count, bytes, clustering depth, auto-clustering."
            }
            Self::GetWarehouseMetric => {
                "Fetch compute cost of the warehouse that ran a query: credits used and average concurrent queries."
            }
        }
    }

    /// Record shape this tool returns
    pub fn output_kind(&self) -> RecordKind {
        match self {
            Self::GetQueryHistory => RecordKind::QueryHistory,
            Self::GetQueryProfile => RecordKind::QueryProfile,
            Self::GetTableStorageMetric => RecordKind::TableStorageMetric,
            Self::GetWarehouseMetric => RecordKind::WarehouseMetric,
        }
    }

    /// JSON schema of the tool's arguments
    pub fn input_schema(&self) -> Value {
        match self {
            Self::GetWarehouseMetric => schemars::schema_for!(WarehouseMetricInput).to_value(),
            _ => schemars::schema_for!(QueryIdInput).to_value(),
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

// ============================================================================
// INPUTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QueryIdInput {
    /// Identifier of the query to inspect
    pub query_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WarehouseMetricInput {
    /// Identifier of the query to inspect
    pub query_id: String,
    /// Warehouse that ran the query (from get_query_history)
    pub warehouse_name: String,
}

/// A tool invocation with arguments bound to the tool's input shape
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    QueryHistory {
        query_id: String,
    },
    QueryProfile {
        query_id: String,
    },
    TableStorage {
        query_id: String,
    },
    Warehouse {
        query_id: String,
        warehouse_name: String,
    },
}

impl ToolCall {
    /// Bind raw JSON arguments to `tool`'s input shape
    pub fn parse(tool: ToolName, arguments: &Value) -> Result<Self, ToolError> {
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool,
            message: e.to_string(),
        };
        let call = match tool {
            ToolName::GetWarehouseMetric => {
                let input: WarehouseMetricInput =
                    serde_json::from_value(arguments.clone()).map_err(invalid)?;
                if input.warehouse_name.trim().is_empty() {
                    return Err(ToolError::InvalidArguments {
                        tool,
                        message: "warehouse_name must not be empty".to_string(),
                    });
                }
                Self::Warehouse {
                    query_id: input.query_id,
                    warehouse_name: input.warehouse_name,
                }
            }
            _ => {
                let QueryIdInput { query_id } =
                    serde_json::from_value(arguments.clone()).map_err(invalid)?;
                match tool {
                    ToolName::GetQueryHistory => Self::QueryHistory { query_id },
                    ToolName::GetQueryProfile => Self::QueryProfile { query_id },
                    _ => Self::TableStorage { query_id },
                }
            }
        };
        if call.query_id().trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool,
                message: "query_id must not be empty".to_string(),
            });
        }
        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            Self::QueryHistory { .. } => ToolName::GetQueryHistory,
            Self::QueryProfile { .. } => ToolName::GetQueryProfile,
            Self::TableStorage { .. } => ToolName::GetTableStorageMetric,
            Self::Warehouse { .. } => ToolName::GetWarehouseMetric,
        }
    }

    pub fn query_id(&self) -> &str {
        match self {
            Self::QueryHistory { query_id }
            | Self::QueryProfile { query_id }
            | Self::TableStorage { query_id }
            | Self::Warehouse { query_id, .. } => query_id,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug, Clone)]
pub enum ToolError {
    #[error("Unknown tool '{0}'; available tools: get_query_history, get_query_profile, get_table_storage_metric, get_warehouse_metric")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: ToolName, message: String },

    /// No backing record exists; distinct from a record that failed validation
    #[error("No {kind} found for query_id '{query_id}'")]
    NotFound { kind: RecordKind, query_id: String },

    #[error(transparent)]
    Validation(#[from] SchemaError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("{tool} timed out after {timeout_ms}ms")]
    Timeout { tool: ToolName, timeout_ms: u64 },

    #[error("Failed to encode tool output: {0}")]
    Encode(String),
}

impl ToolError {
    /// Worth retrying: backend unavailable or call timed out
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Source(e) => e.is_transient(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Reported back to the caller as an observation rather than aborting
    pub fn is_observable(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_) | Self::InvalidArguments { .. } | Self::NotFound { .. }
        )
    }
}

// ============================================================================
// TOOL TRAIT
// ============================================================================

/// The read-only diagnostic operations
///
/// Every returned record has passed schema validation and echoes the
/// requested `query_id`.
#[async_trait]
pub trait MetricTools: Send + Sync {
    async fn get_query_history(&self, query_id: &str) -> Result<QueryHistoryRecord, ToolError>;

    async fn get_query_profile(&self, query_id: &str) -> Result<QueryProfile, ToolError>;

    async fn get_table_storage_metric(
        &self,
        query_id: &str,
    ) -> Result<TableStorageMetric, ToolError>;

    async fn get_warehouse_metric(
        &self,
        query_id: &str,
        warehouse_name: &str,
    ) -> Result<WarehouseMetric, ToolError>;

    /// Dispatch a bound call and return its record as JSON
    async fn invoke(&self, call: &ToolCall) -> Result<Value, ToolError> {
        match call {
            ToolCall::QueryHistory { query_id } => encode(&self.get_query_history(query_id).await?),
            ToolCall::QueryProfile { query_id } => encode(&self.get_query_profile(query_id).await?),
            ToolCall::TableStorage { query_id } => {
                encode(&self.get_table_storage_metric(query_id).await?)
            }
            ToolCall::Warehouse {
                query_id,
                warehouse_name,
            } => encode(&self.get_warehouse_metric(query_id, warehouse_name).await?),
        }
    }
}

fn encode<T: Serialize>(record: &T) -> Result<Value, ToolError> {
    serde_json::to_value(record).map_err(|e| ToolError::Encode(e.to_string()))
}
