use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo, ToolsCapability,
};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;

use crate::core::constants::APP_NAME;
use crate::domain::tools::{QueryIdInput, ToolCall, WarehouseMetricInput};
use crate::domain::{MetricToolService, MetricTools, ToolError, ToolName};

type McpError = rmcp::model::ErrorData;

#[derive(Clone)]
pub struct McpServer {
    tools: Arc<MetricToolService>,
    tool_router: ToolRouter<Self>,
}

impl McpServer {
    pub fn new(tools: Arc<MetricToolService>) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Bind `input` to `tool`, invoke it and wrap the validated record
    async fn dispatch(
        &self,
        tool: ToolName,
        input: &impl Serialize,
    ) -> Result<CallToolResult, McpError> {
        let arguments = serde_json::to_value(input)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        let call = ToolCall::parse(tool, &arguments).map_err(mcp_err)?;
        tracing::debug!(tool = %tool, query_id = call.query_id(), "MCP tool call");
        let record = self.tools.invoke(&call).await.map_err(mcp_err)?;
        ok_json(&record)
    }
}

#[tool_handler]
impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
                ..Default::default()
            },
            server_info: Implementation {
                name: APP_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"QueryScope warehouse diagnostics - read-only metrics for a single query.

WORKFLOW:
1. get_query_history for text, warehouse, elapsed time and bytes scanned
2. get_query_profile for table scans (partition pruning) and hash joins
3. get_table_storage_metric for table size and clustering
4. get_warehouse_metric with the warehouse_name from step 1 for credits and concurrency

All records echo the requested query_id. Tools never modify warehouse state."#;

#[tool_router]
impl McpServer {
    #[tool(
        description = "Fetch the execution history of a query: text, warehouse, elapsed time, bytes scanned, rows produced."
    )]
    async fn get_query_history(
        &self,
        Parameters(input): Parameters<QueryIdInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(ToolName::GetQueryHistory, &input).await
    }

    #[tool(
        description = "Fetch the operator-level execution profile of a query (table scans with partition pruning, hash joins with row counts)."
    )]
    async fn get_query_profile(
        &self,
        Parameters(input): Parameters<QueryIdInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(ToolName::GetQueryProfile, &input).await
    }

    #[tool(
        description = "Fetch storage metrics for the tables a query touched: row count, bytes, clustering depth, auto-clustering."
    )]
    async fn get_table_storage_metric(
        &self,
        Parameters(input): Parameters<QueryIdInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(ToolName::GetTableStorageMetric, &input).await
    }

    #[tool(
        description = "Fetch compute cost of the warehouse that ran a query: credits used and average concurrent queries."
    )]
    async fn get_warehouse_metric(
        &self,
        Parameters(input): Parameters<WarehouseMetricInput>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(ToolName::GetWarehouseMetric, &input).await
    }
}

fn ok_json(value: &impl Serialize) -> Result<CallToolResult, McpError> {
    let json =
        serde_json::to_string(value).map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Caller mistakes and missing records are invalid params; the rest is internal
fn mcp_err(e: ToolError) -> McpError {
    tracing::debug!(error = %e, "MCP tool error");
    if e.is_observable() {
        McpError::invalid_params(e.to_string(), None)
    } else {
        McpError::internal_error(e.to_string(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::RecordKind;
    use crate::data::{InMemoryMetricSource, SimulatedMetricSource, SourceError};
    use rmcp::model::ErrorCode;

    fn simulated_server() -> McpServer {
        McpServer::new(Arc::new(MetricToolService::new(Arc::new(
            SimulatedMetricSource::new(),
        ))))
    }

    fn query(id: &str) -> Parameters<QueryIdInput> {
        Parameters(QueryIdInput {
            query_id: id.to_string(),
        })
    }

    #[test]
    fn test_router_lists_exactly_the_four_tools() {
        let server = simulated_server();
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();

        let mut expected: Vec<String> = ToolName::ALL.iter().map(|t| t.to_string()).collect();
        expected.sort();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_router_descriptions_match_tool_names() {
        for tool in simulated_server().tool_router.list_all() {
            let name: ToolName = tool.name.parse().unwrap();
            assert_eq!(
                tool.description.as_deref(),
                Some(name.description()),
                "description drifted for {}",
                name
            );
        }
    }

    #[test]
    fn test_get_info_advertises_tools() {
        let info = simulated_server().get_info();
        assert!(info.capabilities.tools.is_some());
        assert_eq!(info.server_info.name, APP_NAME);
    }

    #[tokio::test]
    async fn test_get_query_profile_returns_record() {
        let result = simulated_server()
            .get_query_profile(query("Q1"))
            .await
            .unwrap();
        assert!(!result.content.is_empty());
    }

    #[tokio::test]
    async fn test_get_warehouse_metric_requires_name() {
        let err = simulated_server()
            .get_warehouse_metric(Parameters(WarehouseMetricInput {
                query_id: "Q1".into(),
                warehouse_name: "  ".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_empty_query_id_is_invalid_params() {
        let err = simulated_server()
            .get_query_history(query(""))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_missing_record_is_invalid_params() {
        let server = McpServer::new(Arc::new(MetricToolService::new(Arc::new(
            InMemoryMetricSource::new(),
        ))));
        let err = server.get_query_history(query("Q404")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        assert!(err.message.contains("Q404"));
    }

    #[test]
    fn test_mcp_err_classification() {
        let not_found = mcp_err(ToolError::NotFound {
            kind: RecordKind::QueryProfile,
            query_id: "Q1".into(),
        });
        assert_eq!(not_found.code, ErrorCode::INVALID_PARAMS);

        let outage = mcp_err(ToolError::Source(SourceError::Unavailable {
            backend: "memory",
            reason: "warehouse offline".into(),
        }));
        assert_eq!(outage.code, ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn test_ok_json_serializes() {
        let result = ok_json(&serde_json::json!({"query_id": "Q1"})).unwrap();
        assert!(!result.content.is_empty());
    }
}
