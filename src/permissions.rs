//! Permission checking for query ASTs.
//!
//! Every `#resolve` in a query must point at a field whose declared
//! `queryable` tier is visible to the caller, and every operation applied
//! directly to a resolved field must appear in that field's declared
//! `operations` list. Both execution backends run this check through the
//! same entry point, differing only in how they fetch a field's search
//! properties (schema-path walking for the evaluator, join collection for
//! the SQL compiler).

use serde_json::Value;

use crate::{
    ast::{Ast, Function},
    error::QueryError,
    schema::SearchProps,
};

/// Verify that a query only touches fields and operations the caller is
/// allowed to use.
///
/// `getter` fetches the search properties of the field a resolve path
/// points at; `internal` widens the visible tiers from `{all}` to
/// `{all, internal}`.
///
/// The operation check is intentionally shallow: only *direct* resolve
/// children of a comparison node are checked against that field's
/// `operations` list. Resolves nested deeper still get their `queryable`
/// tier enforced through recursion. The permission tests pin this down as
/// a documented limitation.
pub fn check_ast_permissions<F>(
    ast: &Ast,
    schema: &Value,
    getter: &mut F,
    internal: bool,
) -> Result<(), QueryError>
where
    F: FnMut(&[String], &Value) -> Result<SearchProps, QueryError>,
{
    let expr = match ast {
        Ast::Literal(_) => return Ok(()),
        Ast::Expression(expr) => expr,
    };

    // #_wc is produced by the SQL compiler after this check has run; a
    // caller-supplied query must never contain it.
    if expr.function() == Function::Wildcard {
        return Err(QueryError::Type(
            "#_wc is internal to the SQL compiler and cannot appear in a query".to_string(),
        ));
    }

    if expr.function() == Function::Resolve {
        let path = ast.resolve_segments()?;
        let props = getter(&path, schema)?;
        if !props.queryable.visible(internal) {
            return Err(QueryError::Value(format!(
                "Field \"{}\" is not queryable (tier: {}, access: {})",
                path.join("."),
                props.queryable.name(),
                if internal { "internal" } else { "external" },
            )));
        }
        return Ok(());
    }

    if expr.function().is_operation() {
        for arg in expr.args() {
            if arg.as_expression_of(Function::Resolve).is_none() {
                continue;
            }
            let path = arg.resolve_segments()?;
            let props = getter(&path, schema)?;
            if !props.allows_operation(expr.function()) {
                return Err(QueryError::Value(format!(
                    "Operation {} is not allowed on field \"{}\"",
                    expr.function().operation_name(),
                    path.join("."),
                )));
            }
        }
    }

    for arg in expr.args() {
        check_ast_permissions(arg, schema, getter, internal)?;
    }

    Ok(())
}
