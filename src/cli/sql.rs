use serde_json::{json, Value};

use super::CliError;
use crate::postgres::{search_query_to_sql, SqlParam};

/// Options for the `sql` command
pub struct SqlOptions {
    /// Query payload, as JSON text
    pub query: String,
    /// Annotated JSON Schema, as JSON text
    pub schema: String,
    /// Compile with elevated (internal) access
    pub internal: bool,
}

/// Compile a query into a parameterized SELECT statement, returning
/// `{"sql": ..., "params": [...]}` as JSON.
pub fn execute_sql(options: &SqlOptions) -> Result<Value, CliError> {
    let query: Value = serde_json::from_str(&options.query)?;
    let schema: Value = serde_json::from_str(&options.schema)?;

    let compiled = search_query_to_sql(&query, &schema, options.internal)?;
    Ok(json!({
        "sql": compiled.sql,
        "params": compiled.params.iter().map(SqlParam::to_json).collect::<Vec<Value>>(),
    }))
}
