//! Caller-supplied query identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata describing the query to analyze.
///
/// Captured from the warehouse's query history by the caller. `query_id` is
/// the identity key for the whole workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMetadata {
    pub user: String,
    pub query_id: String,
    pub workspace_name: String,
    pub workspace_id: String,
    pub tenant_id: String,
    pub warehouse_type: String,
    pub timestamp: DateTime<Utc>,
}

impl QueryMetadata {
    /// Checkpoint key for this query's workflow (`query_<query_id>`)
    pub fn thread_id(&self) -> String {
        thread_id_for(&self.query_id)
    }
}

/// Derive the checkpoint thread identifier from a query id
pub fn thread_id_for(query_id: &str) -> String {
    format!("query_{}", query_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_format() {
        assert_eq!(thread_id_for("Q1"), "query_Q1");
    }

    #[test]
    fn test_metadata_thread_id_uses_query_id() {
        let meta = QueryMetadata {
            user: "test_user".into(),
            query_id: "test_query_123".into(),
            workspace_name: "test_workspace".into(),
            workspace_id: "ws_123".into(),
            tenant_id: "tenant_456".into(),
            warehouse_type: "XL".into(),
            timestamp: Utc::now(),
        };
        assert_eq!(meta.thread_id(), "query_test_query_123");
    }
}
