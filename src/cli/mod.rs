//! CLI support for caraway
//!
//! Provides programmatic access to caraway CLI functionality for embedding
//! in other tools.

mod eval;
mod sql;

pub use eval::{execute_eval, EvalOptions};
pub use sql::{execute_sql, SqlOptions};

use std::io;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// Query conversion, permission, or execution error
    Query(crate::QueryError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No data provided for evaluation
    NoData,
    /// Unknown response spec name
    UnknownResponseSpec(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Query(e) => write!(f, "Query error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoData => write!(f, "No data provided. Use --data or pipe JSON to stdin."),
            CliError::UnknownResponseSpec(s) => {
                write!(f, "Unknown response spec: '{}' (expected boolean, count, or items)", s)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Query(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<crate::QueryError> for CliError {
    fn from(e: crate::QueryError) -> Self {
        CliError::Query(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
