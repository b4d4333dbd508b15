//! QueryScope: agentic query performance diagnostics
//!
//! Exposes read-only warehouse metric tools over MCP and drives a bounded
//! diagnostic agent through a checkpointed workflow to a `QueryAnalysis`.

pub mod api;
pub mod app;
pub mod core;
pub mod data;
pub mod domain;
pub mod utils;
