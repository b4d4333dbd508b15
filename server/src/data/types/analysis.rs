//! Diagnostic verdict produced for a query

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Severity of a diagnostic verdict
///
/// `Error` marks analyses synthesized from a failure rather than produced by
/// the reasoning loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured analysis of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QueryAnalysis {
    #[validate(length(min = 1, message = "query_id must not be empty"))]
    pub query_id: String,
    pub query_text: String,
    pub severity: Severity,
    pub issues: Vec<String>,
    pub root_cause: String,
    pub cost_drivers: Map<String, Value>,
}

impl QueryAnalysis {
    /// Build a terminal error analysis with a single issue and no cost drivers
    pub fn error(
        query_id: impl Into<String>,
        issue: impl Into<String>,
        root_cause: impl Into<String>,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            query_text: String::new(),
            severity: Severity::Error,
            issues: vec![issue.into()],
            root_cause: root_cause.into(),
            cost_drivers: Map::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_serde_lowercase() {
        assert_eq!(serde_json::to_value(Severity::Critical).unwrap(), "critical");
        let s: Severity = serde_json::from_value(json!("medium")).unwrap();
        assert_eq!(s, Severity::Medium);
    }

    #[test]
    fn test_severity_rejects_unknown_value() {
        let result: Result<Severity, _> = serde_json::from_value(json!("unknown"));
        assert!(result.is_err());
    }

    #[test]
    fn test_error_analysis_shape() {
        let analysis = QueryAnalysis::error("Q1", "Failed to parse agent output", "JSON parsing error");
        assert!(analysis.is_error());
        assert_eq!(analysis.issues, vec!["Failed to parse agent output".to_string()]);
        assert_eq!(analysis.root_cause, "JSON parsing error");
        assert!(analysis.cost_drivers.is_empty());
        assert!(analysis.query_text.is_empty());
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::High.to_string(), "high");
    }
}
