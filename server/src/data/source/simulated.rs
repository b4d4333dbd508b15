//! Simulated metric backend
//!
//! Answers every query id with the same fact-table-scan scenario, echoing the
//! requested identifiers back. Used until a telemetry backend is wired in.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use super::{MetricSource, SourceError};

const SIMULATED_QUERY_TEXT: &str =
    "SELECT * FROM fact_sales f JOIN dim_customer d ON f.cust_id = d.id";
pub const SIMULATED_WAREHOUSE: &str = "XL_WH";

#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedMetricSource;

impl SimulatedMetricSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricSource for SimulatedMetricSource {
    async fn query_history(&self, query_id: &str) -> Result<Option<Value>, SourceError> {
        Ok(Some(json!({
            "query_id": query_id,
            "query_text": SIMULATED_QUERY_TEXT,
            "warehouse_name": SIMULATED_WAREHOUSE,
            "execution_time_ms": 185000,
            "bytes_scanned": 980000000000u64,
            "rows_produced": 120000,
            "start_time": Utc::now(),
        })))
    }

    async fn query_profile(&self, query_id: &str) -> Result<Option<Value>, SourceError> {
        Ok(Some(json!({
            "query_id": query_id,
            "operators": [
                {
                    "operator_type": "TableScan",
                    "table_name": "FACT_SALES",
                    "bytes_scanned": 950000000000u64,
                    "partition_pruning": "NONE"
                },
                {
                    "operator_type": "HashJoin",
                    "join_type": "INNER",
                    "left_rows": 500000000,
                    "right_rows": 120000
                }
            ],
            "total_elapsed_time_ms": 185000
        })))
    }

    async fn table_storage(&self, query_id: &str) -> Result<Option<Value>, SourceError> {
        Ok(Some(json!({
            "query_id": query_id,
            "tables": [{
                "table_name": "FACT_SALES",
                "row_count": 520000000,
                "bytes": 1200000000000u64,
                "clustering_depth": 4.9,
                "auto_clustering": false
            }]
        })))
    }

    async fn warehouse(
        &self,
        query_id: &str,
        warehouse_name: &str,
    ) -> Result<Option<Value>, SourceError> {
        Ok(Some(json!({
            "query_id": query_id,
            "warehouse_name": warehouse_name,
            "credits_used": 38.6,
            "avg_running_queries": 6
        })))
    }

    fn source_name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_query_id() {
        let source = SimulatedMetricSource::new();
        let history = source.query_history("abc").await.unwrap().unwrap();
        assert_eq!(history["query_id"], "abc");
        assert_eq!(history["warehouse_name"], SIMULATED_WAREHOUSE);
        let profile = source.query_profile("abc").await.unwrap().unwrap();
        assert_eq!(profile["query_id"], "abc");
    }

    #[tokio::test]
    async fn test_warehouse_echoes_name() {
        let source = SimulatedMetricSource::new();
        let metric = source.warehouse("abc", "S_WH").await.unwrap().unwrap();
        assert_eq!(metric["warehouse_name"], "S_WH");
    }
}
