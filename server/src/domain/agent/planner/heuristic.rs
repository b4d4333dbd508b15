//! Deterministic rule-based planner
//!
//! Gathers one observation from each tool in a fixed order, then derives a
//! verdict from thresholds on the collected records. Needs no credentials,
//! so it is the default planner.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{Planner, PlannerAction, PlannerError};
use crate::data::types::{
    Operator, PartitionPruning, QueryHistoryRecord, QueryProfile, Severity, TableStorageMetric,
    WarehouseMetric,
};
use crate::domain::agent::transcript::Transcript;
use crate::domain::tools::ToolName;
use crate::utils::json::object_from_pairs;

/// Unpruned scans at or above this size are critical
const CRITICAL_SCAN_BYTES: u64 = 500_000_000_000;

/// Larger/smaller input ratio at which a hash join counts as skewed
const JOIN_SKEW_RATIO: f64 = 1000.0;

/// Clustering depth above which a table without auto-clustering is flagged
const CLUSTERING_DEPTH_LIMIT: f64 = 4.0;

/// Average concurrent queries at which a warehouse counts as contended
const CONTENTION_RUNNING_QUERIES: u64 = 5;

#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicPlanner;

impl HeuristicPlanner {
    pub fn new() -> Self {
        Self
    }
}

fn record<T: DeserializeOwned>(transcript: &Transcript, tool: ToolName) -> Option<T> {
    transcript
        .last_record(tool)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn next_call(transcript: &Transcript) -> Option<PlannerAction> {
    let tool = ToolName::ALL
        .into_iter()
        .find(|tool| !transcript.has_called(*tool))?;
    let mut arguments = json!({ "query_id": transcript.query_id });
    if tool == ToolName::GetWarehouseMetric
        && let Some(history) = record::<QueryHistoryRecord>(transcript, ToolName::GetQueryHistory)
    {
        arguments["warehouse_name"] = Value::String(history.warehouse_name);
    }
    Some(PlannerAction::CallTool {
        id: None,
        name: tool.as_str().to_string(),
        arguments,
    })
}

struct Finding {
    severity: Severity,
    issue: String,
    cause: String,
}

fn profile_findings(profile: &QueryProfile, findings: &mut Vec<Finding>) {
    for op in &profile.operators {
        match op {
            Operator::TableScan(scan) => match scan.partition_pruning {
                PartitionPruning::None => findings.push(Finding {
                    severity: if scan.bytes_scanned >= CRITICAL_SCAN_BYTES {
                        Severity::Critical
                    } else {
                        Severity::High
                    },
                    issue: format!(
                        "Full table scan on {} without partition pruning ({} bytes scanned)",
                        scan.table_name, scan.bytes_scanned
                    ),
                    cause: format!("Full scan of {} with no partition pruning", scan.table_name),
                }),
                PartitionPruning::Partial => findings.push(Finding {
                    severity: Severity::Medium,
                    issue: format!(
                        "Only partial partition pruning on {} ({} bytes scanned)",
                        scan.table_name, scan.bytes_scanned
                    ),
                    cause: format!("Weak partition pruning on {}", scan.table_name),
                }),
                PartitionPruning::Full => {}
            },
            Operator::HashJoin(join) => {
                let larger = join.left_rows.max(join.right_rows) as f64;
                let smaller = join.left_rows.min(join.right_rows).max(1) as f64;
                if larger / smaller >= JOIN_SKEW_RATIO {
                    findings.push(Finding {
                        severity: Severity::Medium,
                        issue: format!(
                            "Skewed {} hash join: {} left rows vs {} right rows",
                            join.join_type.as_str(),
                            join.left_rows,
                            join.right_rows
                        ),
                        cause: format!("Skewed {} hash join inputs", join.join_type.as_str()),
                    });
                }
            }
        }
    }
}

fn storage_findings(storage: &TableStorageMetric, findings: &mut Vec<Finding>) {
    for table in &storage.tables {
        if table.clustering_depth > CLUSTERING_DEPTH_LIMIT && !table.auto_clustering {
            findings.push(Finding {
                severity: Severity::Medium,
                issue: format!(
                    "Table {} is poorly clustered (depth {}) and auto-clustering is disabled",
                    table.table_name, table.clustering_depth
                ),
                cause: format!("Poor clustering on {}", table.table_name),
            });
        }
    }
}

fn warehouse_findings(warehouse: &WarehouseMetric, findings: &mut Vec<Finding>) {
    if warehouse.avg_running_queries >= CONTENTION_RUNNING_QUERIES {
        findings.push(Finding {
            severity: Severity::Medium,
            issue: format!(
                "Warehouse {} is contended ({} concurrent queries on average, {} credits used)",
                warehouse.warehouse_name, warehouse.avg_running_queries, warehouse.credits_used
            ),
            cause: format!("Contention on warehouse {}", warehouse.warehouse_name),
        });
    }
}

/// Build the final answer from whatever records were collected
fn verdict(transcript: &Transcript) -> Value {
    let history: Option<QueryHistoryRecord> = record(transcript, ToolName::GetQueryHistory);
    let profile: Option<QueryProfile> = record(transcript, ToolName::GetQueryProfile);
    let storage: Option<TableStorageMetric> = record(transcript, ToolName::GetTableStorageMetric);
    let warehouse: Option<WarehouseMetric> = record(transcript, ToolName::GetWarehouseMetric);

    let mut findings = Vec::new();
    if let Some(profile) = &profile {
        profile_findings(profile, &mut findings);
    }
    if let Some(storage) = &storage {
        storage_findings(storage, &mut findings);
    }
    if let Some(warehouse) = &warehouse {
        warehouse_findings(warehouse, &mut findings);
    }

    // Most severe finding first; ties keep collection order
    findings.sort_by(|a, b| b.severity.cmp(&a.severity));
    let severity = findings
        .first()
        .map(|f| f.severity)
        .unwrap_or(Severity::Low);
    let root_cause = findings
        .first()
        .map(|f| f.cause.clone())
        .unwrap_or_else(|| "No inefficiency detected in the collected metrics".to_string());

    let worst_clustering = storage.as_ref().and_then(|s| {
        s.tables
            .iter()
            .map(|t| t.clustering_depth)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
    });

    let cost_drivers = object_from_pairs([
        (
            "execution_time_ms",
            json!(history.as_ref().map(|h| h.execution_time_ms)),
        ),
        (
            "bytes_scanned",
            json!(history.as_ref().map(|h| h.bytes_scanned)),
        ),
        (
            "rows_produced",
            json!(history.as_ref().map(|h| h.rows_produced)),
        ),
        (
            "total_elapsed_time_ms",
            json!(profile.as_ref().map(|p| p.total_elapsed_time_ms)),
        ),
        ("clustering_depth", json!(worst_clustering)),
        (
            "warehouse_name",
            json!(warehouse.as_ref().map(|w| w.warehouse_name.clone())),
        ),
        (
            "credits_used",
            json!(warehouse.as_ref().map(|w| w.credits_used)),
        ),
        (
            "avg_running_queries",
            json!(warehouse.as_ref().map(|w| w.avg_running_queries)),
        ),
    ]);

    json!({
        "query_id": transcript.query_id,
        "query_text": history.map(|h| h.query_text).unwrap_or_default(),
        "severity": severity,
        "issues": findings.into_iter().map(|f| f.issue).collect::<Vec<_>>(),
        "root_cause": root_cause,
        "cost_drivers": cost_drivers,
    })
}

#[async_trait]
impl Planner for HeuristicPlanner {
    async fn next(&self, transcript: &Transcript) -> Result<PlannerAction, PlannerError> {
        if let Some(action) = next_call(transcript) {
            return Ok(action);
        }
        Ok(PlannerAction::FinalAnswer(verdict(transcript).to_string()))
    }

    fn planner_name(&self) -> &'static str {
        "heuristic"
    }
}
