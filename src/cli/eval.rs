use serde_json::Value;

use super::CliError;
use crate::{
    convert::convert_query,
    evaluator::EvaluateOptions,
    response::{perform_search, ResponseSpec},
};

/// Options for the `eval` command
pub struct EvalOptions {
    /// Query payload, as JSON text
    pub query: String,
    /// Annotated JSON Schema, as JSON text
    pub schema: String,
    /// Data structure to evaluate against, as JSON text
    pub data: String,
    /// Evaluate with elevated (internal) access
    pub internal: bool,
    /// Result shape: boolean, count, or items
    pub response: ResponseSpec,
}

/// Convert, permission-check, and evaluate a query against a data
/// structure, returning the response envelope as JSON.
pub fn execute_eval(options: &EvalOptions) -> Result<Value, CliError> {
    let query: Value = serde_json::from_str(&options.query)?;
    let schema: Value = serde_json::from_str(&options.schema)?;
    let data: Value = serde_json::from_str(&options.data)?;

    let ast = convert_query(&query)?;
    let eval_options = EvaluateOptions {
        internal: options.internal,
        // Surface full diagnostics on a local CLI
        secure_errors: false,
        ..EvaluateOptions::default()
    };

    let response = perform_search(&ast, &data, &schema, &eval_options, options.response)?;
    Ok(response.to_json())
}
