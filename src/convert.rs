//! Query payload conversion.
//!
//! A query arrives as a JSON-compatible nested list: the first element of
//! every list is a `#`-prefixed function-name string and the rest are
//! arguments (sub-lists or scalar literals). This module turns such a
//! payload into a normalized [`Ast`].

use serde_json::Value;

use crate::{
    ast::{nodes::json_type_name, simplify, Ast, Function, Literal},
    error::QueryError,
};

/// Convert a raw query payload into a normalized AST.
///
/// A JSON array becomes an [`Expression`](crate::ast::Expression) (head
/// must be a recognized function name, tail converted recursively, arity
/// checked); a bare string/integer/float/boolean becomes a
/// [`Literal`]. The result has double negations collapsed.
///
/// # Errors
///
/// Malformed syntax (empty list, non-string head, unrecognized function
/// name, wrong arity) surfaces as [`QueryError::Syntax`]; a payload that is
/// neither a list nor one of the four literal scalar types surfaces as
/// [`QueryError::Value`].
///
/// # Examples
///
/// ```
/// use caraway::convert_query;
/// use serde_json::json;
///
/// let ast = convert_query(&json!(
///     ["#eq", ["#resolve", "subject", "karyotypic_sex"], "XO"]
/// )).unwrap();
/// assert_eq!(
///     ast.to_string(),
///     r#"[#eq, [#resolve, "subject", "karyotypic_sex"], "XO"]"#
/// );
/// ```
pub fn convert_query(payload: &Value) -> Result<Ast, QueryError> {
    Ok(simplify(convert_node(payload)?))
}

fn convert_node(payload: &Value) -> Result<Ast, QueryError> {
    match payload {
        Value::Array(items) => convert_expression(items),
        Value::String(_) | Value::Bool(_) | Value::Number(_) => {
            Ok(Ast::Literal(Literal::from_json(payload)?))
        }
        v => Err(QueryError::Value(format!(
            "Query must be a function list or a scalar literal, got {}",
            json_type_name(v)
        ))),
    }
}

fn convert_expression(items: &[Value]) -> Result<Ast, QueryError> {
    let head = items
        .first()
        .ok_or_else(|| QueryError::Syntax("Empty expression list".to_string()))?;

    let name = head.as_str().ok_or_else(|| {
        QueryError::Syntax(format!(
            "Expression head must be a function-name string, got {}",
            json_type_name(head)
        ))
    })?;

    let fn_ = Function::from_query_name(name)
        .ok_or_else(|| QueryError::Syntax(format!("Unrecognized function: {}", name)))?;

    let args = items[1..]
        .iter()
        .map(convert_node)
        .collect::<Result<Vec<Ast>, QueryError>>()?;

    Ast::expression(fn_, args)
}
