//! Diagnostic records returned by the metric tools
//!
//! Counts are unsigned, so negative values are rejected when a payload is
//! deserialized. Float metrics and identifiers carry `validator` rules that
//! the schema registry checks before a record is handed out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

// ============================================================================
// QUERY HISTORY
// ============================================================================

/// One execution of a query as recorded in the warehouse history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QueryHistoryRecord {
    #[validate(length(min = 1, message = "query_id must not be empty"))]
    pub query_id: String,
    pub query_text: String,
    #[validate(length(min = 1, message = "warehouse_name must not be empty"))]
    pub warehouse_name: String,
    pub execution_time_ms: u64,
    pub bytes_scanned: u64,
    pub rows_produced: u64,
    pub start_time: DateTime<Utc>,
}

// ============================================================================
// QUERY PROFILE
// ============================================================================

/// Partition pruning achieved by a table scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartitionPruning {
    None,
    Partial,
    Full,
}

impl PartitionPruning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Partial => "PARTIAL",
            Self::Full => "FULL",
        }
    }
}

/// Join semantics of a hash join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Full => "FULL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TableScanOperator {
    #[validate(length(min = 1, message = "table_name must not be empty"))]
    pub table_name: String,
    pub bytes_scanned: u64,
    pub partition_pruning: PartitionPruning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HashJoinOperator {
    pub join_type: JoinType,
    pub left_rows: u64,
    pub right_rows: u64,
}

/// Execution plan operator, discriminated by `operator_type`.
///
/// Unknown tags fail deserialization. Adding an operator kind means adding a
/// variant here and extending the `Validate` match below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator_type")]
pub enum Operator {
    TableScan(TableScanOperator),
    HashJoin(HashJoinOperator),
}

impl Operator {
    pub fn operator_type(&self) -> &'static str {
        match self {
            Self::TableScan(_) => "TableScan",
            Self::HashJoin(_) => "HashJoin",
        }
    }
}

impl Validate for Operator {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::TableScan(op) => op.validate(),
            Self::HashJoin(op) => op.validate(),
        }
    }
}

/// Operator-level execution profile of a query
///
/// `total_elapsed_time_ms` is reported by the engine and is not derived from
/// the operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QueryProfile {
    #[validate(length(min = 1, message = "query_id must not be empty"))]
    pub query_id: String,
    pub operators: Vec<Operator>,
    pub total_elapsed_time_ms: u64,
}

// ============================================================================
// TABLE STORAGE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TableStorage {
    #[validate(length(min = 1, message = "table_name must not be empty"))]
    pub table_name: String,
    pub row_count: u64,
    pub bytes: u64,
    #[validate(range(min = 0.0, message = "clustering_depth must be >= 0"))]
    pub clustering_depth: f64,
    pub auto_clustering: bool,
}

/// Storage footprint of the tables a query touched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TableStorageMetric {
    #[validate(length(min = 1, message = "query_id must not be empty"))]
    pub query_id: String,
    pub tables: Vec<TableStorage>,
}

// ============================================================================
// WAREHOUSE
// ============================================================================

/// Compute cost of the warehouse that ran a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct WarehouseMetric {
    #[validate(length(min = 1, message = "query_id must not be empty"))]
    pub query_id: String,
    #[validate(length(min = 1, message = "warehouse_name must not be empty"))]
    pub warehouse_name: String,
    #[validate(range(min = 0.0, message = "credits_used must be >= 0"))]
    pub credits_used: f64,
    pub avg_running_queries: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_tag_selects_variant() {
        let op: Operator = serde_json::from_value(json!({
            "operator_type": "HashJoin",
            "join_type": "LEFT",
            "left_rows": 10,
            "right_rows": 20
        }))
        .unwrap();
        assert_eq!(op.operator_type(), "HashJoin");
        match op {
            Operator::HashJoin(join) => assert_eq!(join.join_type, JoinType::Left),
            Operator::TableScan(_) => panic!("Expected HashJoin"),
        }
    }

    #[test]
    fn test_operator_serializes_tag() {
        let op = Operator::TableScan(TableScanOperator {
            table_name: "FACT_SALES".into(),
            bytes_scanned: 1,
            partition_pruning: PartitionPruning::Partial,
        });
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value["operator_type"], "TableScan");
        assert_eq!(value["partition_pruning"], "PARTIAL");
    }

    #[test]
    fn test_operator_unknown_tag_rejected() {
        let result: Result<Operator, _> = serde_json::from_value(json!({
            "operator_type": "SortMerge",
            "table_name": "T"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_operator_shape_must_match_tag() {
        // HashJoin fields under a TableScan tag
        let result: Result<Operator, _> = serde_json::from_value(json!({
            "operator_type": "TableScan",
            "join_type": "INNER",
            "left_rows": 1,
            "right_rows": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_operator_validate_dispatches_to_variant() {
        let op = Operator::TableScan(TableScanOperator {
            table_name: String::new(),
            bytes_scanned: 0,
            partition_pruning: PartitionPruning::None,
        });
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_warehouse_negative_credits_invalid() {
        let metric = WarehouseMetric {
            query_id: "Q1".into(),
            warehouse_name: "XL_WH".into(),
            credits_used: -0.5,
            avg_running_queries: 1,
        };
        assert!(metric.validate().is_err());
    }

    #[test]
    fn test_enum_as_str_matches_serde() {
        assert_eq!(
            serde_json::to_value(PartitionPruning::None).unwrap(),
            PartitionPruning::None.as_str()
        );
        assert_eq!(
            serde_json::to_value(JoinType::Full).unwrap(),
            JoinType::Full.as_str()
        );
    }
}
