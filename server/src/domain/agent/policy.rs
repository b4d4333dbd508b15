//! Read-only content gate for final answers
//!
//! The generated parts of an analysis (issues, root cause, cost driver
//! values) must not carry SQL statements or performance-improvement
//! estimates. `query_text` is copied from the history record and is exempt,
//! and so are statement fragments quoted from it.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::data::types::QueryAnalysis;

fn sql_statement() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)\b(select\s+.+?\s+from|insert\s+into|update\s+\w+\s+set|delete\s+from|merge\s+into|create\s+(or\s+replace\s+)?(table|view|index)|alter\s+table|drop\s+(table|view|index))\b",
        )
        .expect("Invalid regex")
    })
}

fn perf_estimate() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(\d+(\.\d+)?\s*(%|x|times)\s+(faster|quicker|speed-?up|improvement|reduction|less|cheaper))|(\b(reduce|cut|improve|speed\s+up|lower|decrease)\w*\b[^.]{0,40}?\bby\s+(~|about\s+|around\s+|approximately\s+|up\s+to\s+)?\d+(\.\d+)?\s*(%|x|times))",
        )
        .expect("Invalid regex")
    })
}

/// Lowercase with whitespace runs collapsed to one space
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Reason a piece of generated text breaks the read-only rules
///
/// A statement match that also appears in the diagnosed query is a quote, not
/// a rewrite.
fn violation(text: &str, query_text: &str) -> Option<&'static str> {
    let quoted = normalize(query_text);
    let rewrites = sql_statement()
        .find_iter(text)
        .any(|m| quoted.is_empty() || !quoted.contains(&normalize(m.as_str())));
    if rewrites {
        Some("contains a SQL statement")
    } else if perf_estimate().is_match(text) {
        Some("contains a performance estimate")
    } else {
        None
    }
}

fn check_value(path: &str, value: &Value, query_text: &str) -> Result<(), String> {
    match value {
        Value::String(s) => match violation(s, query_text) {
            Some(reason) => Err(format!("{} {}", path, reason)),
            None => Ok(()),
        },
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, v)| check_value(&format!("{}[{}]", path, i), v, query_text)),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(k, v)| check_value(&format!("{}.{}", path, k), v, query_text)),
        _ => Ok(()),
    }
}

/// Reject an analysis whose generated text breaks the read-only rules
pub fn check(analysis: &QueryAnalysis) -> Result<(), String> {
    let query_text = analysis.query_text.as_str();
    for (i, issue) in analysis.issues.iter().enumerate() {
        if let Some(reason) = violation(issue, query_text) {
            return Err(format!("issues[{}] {}", i, reason));
        }
    }
    if let Some(reason) = violation(&analysis.root_cause, query_text) {
        return Err(format!("root_cause {}", reason));
    }
    for (key, value) in &analysis.cost_drivers {
        if let Some(reason) = violation(key, query_text) {
            return Err(format!("cost_drivers key '{}' {}", key, reason));
        }
        check_value(&format!("cost_drivers.{}", key), value, query_text)?;
    }
    Ok(())
}
