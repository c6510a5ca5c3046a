//! Uniform response envelope for query results.
//!
//! Both backends' outputs are wrapped in a fixed two-key shape:
//!
//! ```text
//! {"results": <boolean | count | items>, "time": <elapsed seconds>}
//! ```

use std::time::Instant;

use serde_json::{json, Value};

use crate::{
    ast::Ast,
    error::QueryError,
    evaluator::{
        check_ast_against_data_structure, matching_index_combinations, EvaluateOptions,
        IndexCombination,
    },
};

/// What shape of result the caller wants from an in-memory search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSpec {
    /// `true`/`false`: does any index combination match?
    Boolean,
    /// The number of matching index combinations
    Count,
    /// The matching index combinations themselves, as objects mapping
    /// array paths to element indices
    Items,
}

impl ResponseSpec {
    pub fn from_name(name: &str) -> Option<ResponseSpec> {
        match name {
            "boolean" => Some(ResponseSpec::Boolean),
            "count" => Some(ResponseSpec::Count),
            "items" => Some(ResponseSpec::Items),
            _ => None,
        }
    }
}

/// A query result plus the wall-clock seconds it took to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub results: Value,
    pub time: f64,
}

impl QueryResponse {
    /// The fixed two-key JSON shape.
    pub fn to_json(&self) -> Value {
        json!({"results": self.results, "time": self.time})
    }
}

/// Wrap a result-producing closure with timing.
pub fn build_response<F>(f: F) -> Result<QueryResponse, QueryError>
where
    F: FnOnce() -> Result<Value, QueryError>,
{
    let started = Instant::now();
    let results = f()?;
    Ok(QueryResponse {
        results,
        time: started.elapsed().as_secs_f64(),
    })
}

/// Run an in-memory search and wrap its result per the response spec.
pub fn perform_search(
    ast: &Ast,
    data: &Value,
    schema: &Value,
    options: &EvaluateOptions,
    spec: ResponseSpec,
) -> Result<QueryResponse, QueryError> {
    build_response(|| match spec {
        ResponseSpec::Boolean => Ok(Value::Bool(check_ast_against_data_structure(
            ast, data, schema, options,
        )?)),
        ResponseSpec::Count => Ok(Value::from(
            matching_index_combinations(ast, data, schema, options)?.len(),
        )),
        ResponseSpec::Items => Ok(Value::Array(
            matching_index_combinations(ast, data, schema, options)?
                .iter()
                .map(combination_to_json)
                .collect(),
        )),
    })
}

fn combination_to_json(combination: &IndexCombination) -> Value {
    // Sort keys for deterministic output
    let mut entries: Vec<_> = combination.iter().collect();
    entries.sort();
    Value::Object(
        entries
            .into_iter()
            .map(|(path, index)| (path.clone(), Value::from(*index)))
            .collect(),
    )
}
