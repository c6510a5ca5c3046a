//! In-memory query evaluation.
//!
//! Evaluates a query AST directly against a nested JSON data structure.
//! SQL-style existential matching over arrays ("the query matches if
//! *some* row does") is emulated by enumerating **index combinations**:
//! every `[item]` marker in a resolve path is bound to one concrete array
//! index, the full cross product of bindings is generated, and the AST is
//! evaluated once per combination. A query matches if any combination
//! evaluates to literal `true`.
//!
//! Evaluation is synchronous and side-effect-free: all working state is
//! built fresh per call, so concurrent use needs no locking. The only
//! resource concern is the combinatorial size of the index cross product,
//! bounded by [`EvaluateOptions::max_index_combinations`].

use std::collections::HashMap;

use regex::Regex;
use rust_decimal::{prelude::FromPrimitive, Decimal};
use serde_json::Value;

use crate::{
    ast::{nodes::json_type_name, Ast, Expression, Function},
    error::QueryError,
    permissions::check_ast_permissions,
    schema::{search_props_for_path, step_schema, validate_data_structure, ITEM, ROOT},
};

/// One fixed traversal choice through every array encountered while
/// resolving a query: a map from the dotted path naming an array (e.g.
/// `_root.biosamples`) to the concrete element index to use.
pub type IndexCombination = HashMap<String, usize>;

/// Per-call evaluation settings.
#[derive(Debug, Clone)]
pub struct EvaluateOptions {
    /// Elevated access: fields with `queryable: "internal"` become visible
    pub internal: bool,

    /// Validate the data structure against the schema before evaluating.
    /// Skippable once an object+schema pair has been proven.
    pub validate: bool,

    /// Enforce schema shape while walking resolve paths. Skippable for
    /// repeated evaluation of an already-proven query.
    pub resolve_checks: bool,

    /// Run the permission check before evaluating. Skippable once proven.
    pub check_permissions: bool,

    /// Omit data and schema contents from schema-mismatch errors
    pub secure_errors: bool,

    /// Upper bound on enumerated index combinations. The cross product is
    /// exponential in the number of independently-indexed arrays, so
    /// callers in a request-handling context should set this.
    pub max_index_combinations: Option<usize>,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        EvaluateOptions {
            internal: false,
            validate: true,
            resolve_checks: true,
            check_permissions: true,
            secure_errors: true,
            max_index_combinations: None,
        }
    }
}

// ========================================
// Single-combination evaluation
// ========================================

/// Evaluates a query AST against a data structure under a fixed array
/// index binding.
///
/// Runs the permission check first when `options.check_permissions` is
/// set, and validates the data structure when `options.validate` is set;
/// both are per-call flags so repeated evaluation against the same
/// object+schema needn't repeat work already proven. For existential
/// matching across all index combinations, use
/// [`check_ast_against_data_structure`] instead.
///
/// # Examples
///
/// ```
/// use caraway::{convert_query, evaluator};
/// use serde_json::json;
///
/// let schema = json!({
///     "type": "object",
///     "properties": {
///         "karyotypic_sex": {
///             "type": "string",
///             "search": {"queryable": "all", "operations": ["eq"]}
///         }
///     }
/// });
/// let ast = convert_query(&json!(["#eq", ["#resolve", "karyotypic_sex"], "XO"])).unwrap();
/// let data = json!({"karyotypic_sex": "XO"});
///
/// let result = evaluator::evaluate(
///     &ast, &data, &schema, None, &evaluator::EvaluateOptions::default(),
/// ).unwrap();
/// assert_eq!(result, json!(true));
/// ```
pub fn evaluate(
    ast: &Ast,
    data: &Value,
    schema: &Value,
    index_combination: Option<&IndexCombination>,
    options: &EvaluateOptions,
) -> Result<Value, QueryError> {
    if options.validate {
        validate_data_structure(data, schema, options.secure_errors)?;
    }
    if options.check_permissions {
        check_ast_permissions(
            ast,
            schema,
            &mut |path, sch| search_props_for_path(sch, path),
            options.internal,
        )?;
    }
    eval_node(ast, data, schema, index_combination, options.resolve_checks)
}

fn eval_node(
    ast: &Ast,
    data: &Value,
    schema: &Value,
    ic: Option<&IndexCombination>,
    resolve_checks: bool,
) -> Result<Value, QueryError> {
    let expr = match ast {
        Ast::Literal(lit) => return Ok(lit.to_json()),
        Ast::Expression(expr) => expr,
    };
    let args = expr.args();
    let eval = |node: &Ast| eval_node(node, data, schema, ic, resolve_checks);

    match expr.function() {
        // Short-circuiting: the RHS is not evaluated (or even type-checked)
        // when the LHS already decides the result.
        Function::And => {
            if !truthy(&eval(&args[0])?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&eval(&args[1])?)))
        }
        Function::Or => {
            if truthy(&eval(&args[0])?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&eval(&args[1])?)))
        }
        Function::Not => Ok(Value::Bool(!truthy(&eval(&args[0])?))),

        Function::Eq => Ok(Value::Bool(values_equal(&eval(&args[0])?, &eval(&args[1])?))),
        Function::Lt => eval_ordering(expr, &eval(&args[0])?, &eval(&args[1])?, |o| o.is_lt()),
        Function::Le => eval_ordering(expr, &eval(&args[0])?, &eval(&args[1])?, |o| o.is_le()),
        Function::Gt => eval_ordering(expr, &eval(&args[0])?, &eval(&args[1])?, |o| o.is_gt()),
        Function::Ge => eval_ordering(expr, &eval(&args[0])?, &eval(&args[1])?, |o| o.is_ge()),

        Function::Co => {
            let (l, r) = both_strings(expr, &eval(&args[0])?, &eval(&args[1])?)?;
            Ok(Value::Bool(l.contains(&r)))
        }
        Function::Ico => {
            let (l, r) = both_strings(expr, &eval(&args[0])?, &eval(&args[1])?)?;
            Ok(Value::Bool(l.to_lowercase().contains(&r.to_lowercase())))
        }
        Function::Isw => {
            let (l, r) = both_strings(expr, &eval(&args[0])?, &eval(&args[1])?)?;
            Ok(Value::Bool(l.to_lowercase().starts_with(&r.to_lowercase())))
        }
        Function::Iew => {
            let (l, r) = both_strings(expr, &eval(&args[0])?, &eval(&args[1])?)?;
            Ok(Value::Bool(l.to_lowercase().ends_with(&r.to_lowercase())))
        }
        Function::Like => {
            let (l, r) = both_strings(expr, &eval(&args[0])?, &eval(&args[1])?)?;
            Ok(Value::Bool(sql_pattern_to_regex(&r, false)?.is_match(&l)))
        }
        Function::Ilike => {
            let (l, r) = both_strings(expr, &eval(&args[0])?, &eval(&args[1])?)?;
            Ok(Value::Bool(sql_pattern_to_regex(&r, true)?.is_match(&l)))
        }

        Function::In => {
            let needle = eval(&args[0])?;
            let haystack = eval(&args[1])?;
            let items = haystack.as_array().ok_or_else(|| {
                QueryError::Type(format!(
                    "#in requires a #list right-hand side, got {}",
                    json_type_name(&haystack)
                ))
            })?;
            Ok(Value::Bool(items.iter().any(|v| values_equal(&needle, v))))
        }

        Function::Resolve => {
            let segments = ast.resolve_segments()?;
            resolve_path(&segments, data, schema, ic, resolve_checks).cloned()
        }
        Function::List => Ok(Value::Array(
            args.iter().map(eval).collect::<Result<Vec<Value>, QueryError>>()?,
        )),

        Function::Wildcard => Err(QueryError::Type(
            "#_wc is internal to the SQL compiler and cannot be evaluated".to_string(),
        )),
    }
}

/// Truthiness for boolean combinators (mirrors loose JSON truthiness)
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(obj) => !obj.is_empty(),
    }
}

/// Equality with exact cross-type numeric comparison (an i64 never goes
/// through a lossy f64 cast on the way to being compared with a float).
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (number_to_decimal(x), number_to_decimal(y))
        {
            (Some(xd), Some(yd)) => xd == yd,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

fn number_to_decimal(n: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        Decimal::from_i64(i)
    } else if let Some(u) = n.as_u64() {
        Decimal::from_u64(u)
    } else {
        n.as_f64().and_then(Decimal::from_f64)
    }
}

fn eval_ordering(
    expr: &Expression,
    left: &Value,
    right: &Value,
    accept: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, QueryError> {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            match (number_to_decimal(a), number_to_decimal(b)) {
                (Some(ad), Some(bd)) => Some(ad.cmp(&bd)),
                _ => a.as_f64().partial_cmp(&b.as_f64()),
            }
        }
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match ordering {
        Some(o) => Ok(Value::Bool(accept(o))),
        None => Err(QueryError::Type(format!(
            "Cannot compare {} and {} with {}",
            json_type_name(left),
            json_type_name(right),
            expr.function(),
        ))),
    }
}

fn both_strings(
    expr: &Expression,
    left: &Value,
    right: &Value,
) -> Result<(String, String), QueryError> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Ok((l.clone(), r.clone())),
        (l, r) => Err(QueryError::Type(format!(
            "{} requires string operands, got {} and {}",
            expr.function(),
            json_type_name(l),
            json_type_name(r),
        ))),
    }
}

/// Translate a SQL-style `%`/`_` wildcard pattern into a full-string
/// anchored regex. `%` matches any run of characters, `_` any single
/// character; a backslash escapes the following wildcard character; every
/// regex metacharacter in the pattern is escaped.
fn sql_pattern_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, QueryError> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        translated.push_str("(?i)");
    }
    translated.push('^');

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            '\\' => match chars.next() {
                Some(escaped @ ('%' | '_' | '\\')) => {
                    translated.push_str(&regex::escape(&escaped.to_string()));
                }
                Some(other) => {
                    // Backslash only escapes wildcards; otherwise it is a
                    // literal character followed by a literal character.
                    translated.push_str(&regex::escape("\\"));
                    translated.push_str(&regex::escape(&other.to_string()));
                }
                None => translated.push_str(&regex::escape("\\")),
            },
            c => translated.push_str(&regex::escape(&c.to_string())),
        }
    }
    translated.push('$');

    Regex::new(&translated)
        .map_err(|e| QueryError::Type(format!("Invalid wildcard pattern {:?}: {}", pattern, e)))
}

// ========================================
// Resolve
// ========================================

/// Walk a data structure by resolve-path segments under a fixed index
/// combination.
///
/// `[item]` segments dereference the index bound for the array's dotted
/// path in `ic` (an [`QueryError::IndexBinding`] if no binding exists);
/// ordinary segments descend by key. With `resolve_checks`, every step is
/// also checked against the schema's shape rules.
fn resolve_path<'a>(
    segments: &[String],
    data: &'a Value,
    schema: &Value,
    ic: Option<&IndexCombination>,
    resolve_checks: bool,
) -> Result<&'a Value, QueryError> {
    let mut node = data;
    let mut schema_node = schema;
    let mut path = String::from(ROOT);

    for segment in segments {
        if resolve_checks {
            schema_node = step_schema(schema_node, segment)?;
        }

        if segment == ITEM {
            let arr = node.as_array().ok_or_else(|| {
                QueryError::Type(format!(
                    "Cannot index into {} with {} at {}",
                    json_type_name(node),
                    ITEM,
                    path
                ))
            })?;
            let index = *ic.and_then(|c| c.get(&path)).ok_or_else(|| {
                QueryError::IndexBinding(format!(
                    "No index binding for array at {} in the active combination",
                    path
                ))
            })?;
            node = arr.get(index).ok_or_else(|| {
                QueryError::IndexBinding(format!(
                    "Index {} out of bounds for array at {} (length {})",
                    index,
                    path,
                    arr.len()
                ))
            })?;
            push_path(&mut path, ITEM);
        } else {
            let obj = node.as_object().ok_or_else(|| {
                QueryError::Type(format!(
                    "Cannot access field {:?} on {} at {}",
                    segment,
                    json_type_name(node),
                    path
                ))
            })?;
            node = obj.get(segment).ok_or_else(|| {
                QueryError::Value(format!(
                    "Field {:?} not present in data structure at {}",
                    segment, path
                ))
            })?;
            push_path(&mut path, segment);
        }
    }

    Ok(node)
}

/// Extend a dotted path with one segment. Shared by the resolver and the
/// array-length collector so their index-combination keys cannot drift.
fn push_path(path: &mut String, segment: &str) {
    path.push('.');
    path.push_str(segment);
}

// ========================================
// Index-combination enumeration
// ========================================

/// Lengths of the arrays a query's resolve paths traverse.
///
/// `children[i]` holds the trees of any nested arrays reachable under a
/// fixed parent index `i`, so independent siblings cross-multiply while
/// nested arrays contribute `sum(b_i)` combinations.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLengths {
    /// Dotted path naming the array (e.g. `_root.biosamples`)
    pub path: String,
    pub len: usize,
    pub children: Vec<Vec<ArrayLengths>>,
}

/// Walk the AST and collect the length tree of every array referenced by
/// an `[item]` segment, deduplicated so that the same array visited both
/// narrowly and with deeper children elsewhere in the AST keeps only the
/// most specific view.
///
/// Collection is lenient about the concrete data: a resolve path that dead
/// ends (missing field, non-array where an `[item]` sits) contributes no
/// lengths, and any error it implies is surfaced later by evaluation.
pub fn collect_array_lengths(ast: &Ast, data: &Value) -> Vec<ArrayLengths> {
    let mut forest: Vec<ArrayLengths> = Vec::new();
    collect_into(ast, data, &mut forest);
    forest
}

fn collect_into(ast: &Ast, data: &Value, forest: &mut Vec<ArrayLengths>) {
    let expr = match ast {
        Ast::Literal(_) => return,
        Ast::Expression(expr) => expr,
    };

    if expr.function() == Function::Resolve {
        if let Ok(segments) = ast.resolve_segments() {
            if let Some(tree) = resolve_array_lengths(&segments, data, String::from(ROOT)) {
                merge_into_forest(forest, tree);
            }
        }
        return;
    }

    for arg in expr.args() {
        collect_into(arg, data, forest);
    }
}

fn resolve_array_lengths(
    segments: &[String],
    data: &Value,
    mut path: String,
) -> Option<ArrayLengths> {
    let mut node = data;

    for (i, segment) in segments.iter().enumerate() {
        if segment == ITEM {
            let arr = node.as_array()?;
            let array_path = path.clone();
            push_path(&mut path, ITEM);
            let children = arr
                .iter()
                .map(|element| {
                    resolve_array_lengths(&segments[i + 1..], element, path.clone())
                        .into_iter()
                        .collect()
                })
                .collect();
            return Some(ArrayLengths {
                path: array_path,
                len: arr.len(),
                children,
            });
        }
        node = node.as_object()?.get(segment)?;
        push_path(&mut path, segment);
    }

    None
}

fn merge_into_forest(forest: &mut Vec<ArrayLengths>, tree: ArrayLengths) {
    match forest.iter_mut().find(|t| t.path == tree.path) {
        None => forest.push(tree),
        Some(existing) => {
            // Same array reached twice: lengths agree (same data), so only
            // the per-index children need merging.
            for (slot, new_children) in existing.children.iter_mut().zip(tree.children) {
                for child in new_children {
                    merge_into_forest(slot, child);
                }
            }
        }
    }
}

/// Generate the full cross product of index assignments for a forest of
/// array-length trees: every valid index of each array, crossed with the
/// combinations of that element's nested arrays, crossed across sibling
/// trees. An empty forest yields exactly one empty combination, so
/// non-array queries still evaluate once. The result is a materialized,
/// re-iterable sequence.
pub fn index_combinations(forest: &[ArrayLengths]) -> Vec<IndexCombination> {
    let (first, rest) = match forest.split_first() {
        Some(split) => split,
        None => return vec![IndexCombination::new()],
    };

    let rest_combinations = index_combinations(rest);
    let mut combinations = Vec::new();
    for (index, nested) in first.children.iter().enumerate() {
        for nested_combo in index_combinations(nested) {
            for rest_combo in &rest_combinations {
                let mut combo = nested_combo.clone();
                combo.extend(rest_combo.iter().map(|(k, v)| (k.clone(), *v)));
                combo.insert(first.path.clone(), index);
                combinations.push(combo);
            }
        }
    }
    combinations
}

// ========================================
// Existential matching
// ========================================

fn enumerate_combinations(
    ast: &Ast,
    data: &Value,
    schema: &Value,
    options: &EvaluateOptions,
) -> Result<Vec<IndexCombination>, QueryError> {
    if options.validate {
        validate_data_structure(data, schema, options.secure_errors)?;
    }
    if options.check_permissions {
        check_ast_permissions(
            ast,
            schema,
            &mut |path, sch| search_props_for_path(sch, path),
            options.internal,
        )?;
    }

    let forest = collect_array_lengths(ast, data);
    let combinations = index_combinations(&forest);

    if let Some(max) = options.max_index_combinations {
        if combinations.len() > max {
            return Err(QueryError::Value(format!(
                "Query requires {} index combinations, above the configured bound of {}",
                combinations.len(),
                max
            )));
        }
    }

    Ok(combinations)
}

/// Existential match: `true` iff at least one index combination makes the
/// AST evaluate to literal `true`.
///
/// Validation and the permission check run once up front (each skippable
/// via [`EvaluateOptions`]); schema resolve checks run only while
/// evaluating the first combination. Callers must not rely on
/// per-combination re-validation — this amortization is part of the
/// contract. An error raised during any one combination's evaluation
/// aborts the whole call; there are no skip-and-continue semantics.
pub fn check_ast_against_data_structure(
    ast: &Ast,
    data: &Value,
    schema: &Value,
    options: &EvaluateOptions,
) -> Result<bool, QueryError> {
    let mut resolve_checks = options.resolve_checks;
    for combination in enumerate_combinations(ast, data, schema, options)? {
        let result = eval_node(ast, data, schema, Some(&combination), resolve_checks)?;
        resolve_checks = false;
        if result == Value::Bool(true) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The index combinations under which the AST evaluates to literal `true`,
/// for callers that need to know *which* array elements satisfied the
/// query rather than just whether any did. Same checking/amortization
/// contract as [`check_ast_against_data_structure`].
pub fn matching_index_combinations(
    ast: &Ast,
    data: &Value,
    schema: &Value,
    options: &EvaluateOptions,
) -> Result<Vec<IndexCombination>, QueryError> {
    let mut matches = Vec::new();
    let mut resolve_checks = options.resolve_checks;
    for combination in enumerate_combinations(ast, data, schema, options)? {
        let result = eval_node(ast, data, schema, Some(&combination), resolve_checks)?;
        resolve_checks = false;
        if result == Value::Bool(true) {
            matches.push(combination);
        }
    }
    Ok(matches)
}
