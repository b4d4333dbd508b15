//! Running record of one agent run

use serde_json::{Value, json};

use crate::domain::tools::ToolName;

/// Result of a tool call as fed back to the planner
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Validated record returned by the tool
    Record(Value),
    /// Recoverable failure (unknown tool, bad arguments, not found)
    Error(String),
}

impl Observation {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Text form handed to a chat model as the tool message content
    pub fn to_content(&self) -> String {
        match self {
            Self::Record(value) => value.to_string(),
            Self::Error(message) => json!({ "error": message }).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub step: u32,
    pub call_id: String,
    /// Tool name as requested by the planner (may be outside the allow-list)
    pub tool: String,
    pub arguments: Value,
    pub observation: Observation,
}

/// Task plus the ordered tool calls and observations so far
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub query_id: String,
    pub task: String,
    pub entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(query_id: &str) -> Self {
        Self {
            query_id: query_id.to_string(),
            task: format!("Analyze this query: {}", query_id),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `tool` has been called, successfully or not
    pub fn has_called(&self, tool: ToolName) -> bool {
        self.entries.iter().any(|e| e.tool == tool.as_str())
    }

    /// Most recent successful observation of `tool`
    pub fn last_record(&self, tool: ToolName) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .filter(|e| e.tool == tool.as_str())
            .find_map(|e| match &e.observation {
                Observation::Record(value) => Some(value),
                Observation::Error(_) => None,
            })
    }
}
