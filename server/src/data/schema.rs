//! Schema registry for diagnostic records
//!
//! Every record that crosses a trust boundary goes through [`parse`] or
//! [`validate`]: tool outputs before the tool service returns them, and the
//! agent's final answer before it is accepted. Validation fails closed; a
//! record that does not fully conform is never handed out.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use super::types::{
    QueryAnalysis, QueryHistoryRecord, QueryProfile, TableStorageMetric, WarehouseMetric,
};

/// Record shapes known to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    QueryHistory,
    QueryProfile,
    TableStorageMetric,
    WarehouseMetric,
    QueryAnalysis,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryHistory => "QueryHistoryRecord",
            Self::QueryProfile => "QueryProfile",
            Self::TableStorageMetric => "TableStorageMetric",
            Self::WarehouseMetric => "WarehouseMetric",
            Self::QueryAnalysis => "QueryAnalysis",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Payload is not valid JSON for the record shape (missing field, wrong
    /// type, negative count, unknown operator tag)
    #[error("{kind} does not match schema: {message}")]
    Malformed { kind: RecordKind, message: String },

    /// Payload has the right shape but violates a field rule
    #[error("{kind} failed validation: {message}")]
    Invalid { kind: RecordKind, message: String },

    /// Record echoes a different query_id than the one requested
    #[error("{kind} carries query_id '{actual}' but '{expected}' was requested")]
    QueryIdMismatch {
        kind: RecordKind,
        expected: String,
        actual: String,
    },
}

impl SchemaError {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Malformed { kind, .. }
            | Self::Invalid { kind, .. }
            | Self::QueryIdMismatch { kind, .. } => *kind,
        }
    }
}

/// A record shape registered with the schema registry
pub trait Record: Serialize + DeserializeOwned + Validate {
    const KIND: RecordKind;

    /// The query_id this record claims to describe
    fn query_id(&self) -> &str;

    /// Run all field rules, including those of nested elements
    fn check(&self) -> Result<(), String> {
        self.validate().map_err(|e| format_validation_errors(&e))
    }
}

impl Record for QueryHistoryRecord {
    const KIND: RecordKind = RecordKind::QueryHistory;

    fn query_id(&self) -> &str {
        &self.query_id
    }
}

impl Record for QueryProfile {
    const KIND: RecordKind = RecordKind::QueryProfile;

    fn query_id(&self) -> &str {
        &self.query_id
    }

    fn check(&self) -> Result<(), String> {
        let mut messages = Vec::new();
        if let Err(e) = self.validate() {
            messages.push(format_validation_errors(&e));
        }
        for (i, op) in self.operators.iter().enumerate() {
            if let Err(e) = op.validate() {
                messages.push(format!(
                    "operators[{}] ({}): {}",
                    i,
                    op.operator_type(),
                    format_validation_errors(&e)
                ));
            }
        }
        join_messages(messages)
    }
}

impl Record for TableStorageMetric {
    const KIND: RecordKind = RecordKind::TableStorageMetric;

    fn query_id(&self) -> &str {
        &self.query_id
    }

    fn check(&self) -> Result<(), String> {
        let mut messages = Vec::new();
        if let Err(e) = self.validate() {
            messages.push(format_validation_errors(&e));
        }
        for (i, table) in self.tables.iter().enumerate() {
            if let Err(e) = table.validate() {
                messages.push(format!("tables[{}]: {}", i, format_validation_errors(&e)));
            }
        }
        join_messages(messages)
    }
}

impl Record for WarehouseMetric {
    const KIND: RecordKind = RecordKind::WarehouseMetric;

    fn query_id(&self) -> &str {
        &self.query_id
    }
}

impl Record for QueryAnalysis {
    const KIND: RecordKind = RecordKind::QueryAnalysis;

    fn query_id(&self) -> &str {
        &self.query_id
    }
}

/// Deserialize and validate a record from a JSON value
pub fn parse<T: Record>(value: Value) -> Result<T, SchemaError> {
    let record: T = serde_json::from_value(value).map_err(|e| SchemaError::Malformed {
        kind: T::KIND,
        message: e.to_string(),
    })?;
    validate(record)
}

/// Deserialize and validate a record from JSON text
pub fn parse_str<T: Record>(json: &str) -> Result<T, SchemaError> {
    let record: T = serde_json::from_str(json).map_err(|e| SchemaError::Malformed {
        kind: T::KIND,
        message: e.to_string(),
    })?;
    validate(record)
}

/// Validate an already-typed record
pub fn validate<T: Record>(record: T) -> Result<T, SchemaError> {
    record
        .check()
        .map_err(|message| SchemaError::Invalid {
            kind: T::KIND,
            message,
        })?;
    Ok(record)
}

/// Verify that a record echoes the query_id it was requested with
pub fn ensure_query_id<T: Record>(record: &T, expected: &str) -> Result<(), SchemaError> {
    if record.query_id() != expected {
        return Err(SchemaError::QueryIdMismatch {
            kind: T::KIND,
            expected: expected.to_string(),
            actual: record.query_id().to_string(),
        });
    }
    Ok(())
}

fn join_messages(messages: Vec<String>) -> Result<(), String> {
    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages.join("; "))
    }
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
