//! Compilation of query ASTs into parameterized PostgreSQL.
//!
//! The same `search`-annotated JSON Schema that drives in-memory
//! evaluation also describes a normalized relational layout
//! (`search.database`: relations, fields, keys, relationships). This
//! module walks resolve paths to collect the chain of relations, aliases,
//! and join keys they imply, renders a `FROM ... LEFT JOIN ...` fragment,
//! and recursively compiles the AST into a parameterized `WHERE` boolean
//! expression over those aliases:
//!
//! ```text
//! SELECT "<root>".* FROM <joins> WHERE <condition>
//! ```
//!
//! Placeholders are numbered (`$1`, `$2`, ...) with parameters accumulated
//! in left-to-right AST order, ready for a PostgreSQL client library. The
//! compiler enforces the identical permission contract as the in-memory
//! evaluator, using a search-property getter backed by join collection.

use serde_json::Value;

use crate::{
    ast::{Ast, Function, Literal},
    convert::convert_query,
    error::QueryError,
    permissions::check_ast_permissions,
    schema::{
        schema_type, step_schema, DatabaseProps, RelationKind, Relationship, SearchProps, ITEM,
        ROOT,
    },
};

/// A positional SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Literal(Literal),
    /// A collection bound to a single placeholder, for `IN`
    Array(Vec<Literal>),
}

impl SqlParam {
    /// JSON rendering of the parameter value, for display surfaces.
    pub fn to_json(&self) -> Value {
        match self {
            SqlParam::Literal(lit) => lit.to_json(),
            SqlParam::Array(values) => Value::Array(values.iter().map(Literal::to_json).collect()),
        }
    }
}

/// A compiled query: SQL text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Linkage between a term's relation and its parent's: `(parent key,
/// child key)`, already translated for the relationship type.
pub type KeyLink = (String, String);

/// One step in a resolve path's chain of relations.
///
/// Terms are collected in path order. A compound (object/array) step
/// carries a relation and no field; a primitive resolve target yields the
/// terminal term with `field != None` and no further relation.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinTerm {
    pub parent_relation: Option<String>,
    /// SQL relation expression: a quoted table name or a synthesized
    /// `jsonb_to_record(...)` / `jsonb_array_elements(...)` / `unnest(...)`
    pub relation: Option<String>,
    pub parent_alias: Option<String>,
    pub alias: String,
    pub key_link: Option<KeyLink>,
    /// Resolved column name, set only on the terminal term of a
    /// primitive-typed resolve
    pub field: Option<String>,
    pub search: SearchProps,
    /// Remainder of the resolve path not yet consumed at this term
    pub unresolved: Vec<String>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Alias slug for an accumulated path: segments joined with `_`, with any
/// character outside `[A-Za-z0-9_]` stripped.
fn alias_slug(segments: &[String]) -> String {
    segments
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Column name a scalar set-returning relation exposes its elements as
/// (`jsonb_array_elements(...) AS a` yields column `value`).
const ELEMENT_FIELD: &str = "value";

/// Walk a resolve path against the schema and collect the relation/alias/
/// key-link chain needed to reach its target.
///
/// The chain always starts with a term for the schema root (the path is
/// implicitly prefixed with `_root`). At each compound step the relation
/// is either declared explicitly (`search.database.relation`) or
/// synthesized on the fly for JSON/JSONB object or array access; `[item]`
/// steps stay on the containing array's relation, whose rows already are
/// the elements.
///
/// Traversal fails if a relation cannot be determined for a compound node,
/// or on any illegal schema step (`[item]` on a non-array, a field on an
/// array, a missing or undeclared property).
pub fn collect_resolve_join_tables(
    segments: &[String],
    schema: &Value,
) -> Result<Vec<JoinTerm>, QueryError> {
    let mut terms: Vec<JoinTerm> = Vec::new();
    let mut schema_node = schema;
    let mut alias_segments: Vec<String> = vec![ROOT.to_string()];
    let mut parent_alias: Option<String> = None;
    let mut parent_relation: Option<String> = None;

    // The synthetic root step, then one step per path segment.
    for position in 0..=segments.len() {
        let (segment, unresolved) = if position == 0 {
            (ROOT, &segments[..])
        } else {
            schema_node = step_schema(schema_node, &segments[position - 1])?;
            (segments[position - 1].as_str(), &segments[position..])
        };

        let props = SearchProps::from_schema(schema_node);
        let db = props.database.clone().unwrap_or_default();

        match schema_type(schema_node) {
            Some("object") | Some("array") if segment != ITEM => {
                let field = db.field.clone().unwrap_or_else(|| segment.to_string());
                let relation = determine_relation(&db, schema_node, &parent_alias, &field)
                    .ok_or_else(|| {
                        QueryError::Value(format!(
                            "Cannot determine a relation for compound field {:?}",
                            segment
                        ))
                    })?;

                if position > 0 {
                    alias_segments.push(segment.to_string());
                }
                let alias = alias_slug(&alias_segments);

                terms.push(JoinTerm {
                    parent_relation: parent_relation.clone(),
                    relation: Some(relation.clone()),
                    parent_alias: parent_alias.clone(),
                    alias: alias.clone(),
                    key_link: key_link_for(&db)?,
                    field: None,
                    search: props,
                    unresolved: unresolved.to_vec(),
                });
                parent_alias = Some(alias);
                parent_relation = Some(relation);
            }

            // [item] stays on the array's relation; its rows are the
            // elements. Stepping already moved the schema into `items`.
            Some("object") | Some("array") => {}

            // Primitive target: terminal term reading a column off the
            // enclosing relation.
            _ => {
                let alias = parent_alias.clone().ok_or_else(|| {
                    QueryError::Value(format!(
                        "Field {:?} resolves outside any relation",
                        segment
                    ))
                })?;
                let field = db.field.clone().unwrap_or_else(|| {
                    if segment == ITEM {
                        ELEMENT_FIELD.to_string()
                    } else {
                        segment.to_string()
                    }
                });
                terms.push(JoinTerm {
                    parent_relation: parent_relation.clone(),
                    relation: None,
                    parent_alias: parent_alias.clone(),
                    alias,
                    key_link: None,
                    field: Some(field),
                    search: props,
                    unresolved: unresolved.to_vec(),
                });
            }
        }
    }

    Ok(terms)
}

fn determine_relation(
    db: &DatabaseProps,
    schema_node: &Value,
    parent_alias: &Option<String>,
    field: &str,
) -> Option<String> {
    if let Some(relation) = &db.relation {
        return Some(quote_ident(relation));
    }

    // Synthesize a relation for JSON/JSONB or native-array access
    let parent = parent_alias.as_ref()?;
    let column = format!("{}.{}", quote_ident(parent), quote_ident(field));
    match (db.kind?, schema_type(schema_node)?) {
        (RelationKind::Json | RelationKind::Jsonb, "object") => {
            Some(format!("jsonb_to_record({})", column))
        }
        (RelationKind::Json | RelationKind::Jsonb, "array") => {
            Some(format!("jsonb_array_elements({})", column))
        }
        (RelationKind::Array, "array") => Some(format!("unnest({})", column)),
        _ => None,
    }
}

fn key_link_for(db: &DatabaseProps) -> Result<Option<KeyLink>, QueryError> {
    match &db.relationship {
        None => Ok(None),
        Some(Relationship::ManyToOne { foreign_key }) => {
            let primary_key = db.primary_key.clone().ok_or_else(|| {
                QueryError::Value(
                    "MANY_TO_ONE relationship requires a primary_key on the child".to_string(),
                )
            })?;
            Ok(Some((foreign_key.clone(), primary_key)))
        }
        Some(
            Relationship::OneToMany {
                parent_primary_key,
                parent_foreign_key,
            }
            | Relationship::ManyToMany {
                parent_primary_key,
                parent_foreign_key,
            },
        ) => Ok(Some((parent_primary_key.clone(), parent_foreign_key.clone()))),
    }
}

/// Gather the join chains of every distinct `#resolve` in the AST,
/// deduplicated by alias in first-seen order. Only relation-bearing terms
/// are kept; terminal field terms reuse their parent's alias.
pub fn collect_join_tables(ast: &Ast, schema: &Value) -> Result<Vec<JoinTerm>, QueryError> {
    let mut terms: Vec<JoinTerm> = Vec::new();
    collect_join_tables_into(ast, schema, &mut terms)?;
    Ok(terms)
}

fn collect_join_tables_into(
    ast: &Ast,
    schema: &Value,
    terms: &mut Vec<JoinTerm>,
) -> Result<(), QueryError> {
    let expr = match ast {
        Ast::Literal(_) => return Ok(()),
        Ast::Expression(expr) => expr,
    };

    if expr.function() == Function::Resolve {
        let segments = ast.resolve_segments()?;
        for term in collect_resolve_join_tables(&segments, schema)? {
            if term.relation.is_some() && !terms.iter().any(|t| t.alias == term.alias) {
                terms.push(term);
            }
        }
        return Ok(());
    }

    for arg in expr.args() {
        collect_join_tables_into(arg, schema, terms)?;
    }
    Ok(())
}

/// Render the relation list for `FROM`: the first term becomes the root
/// relation, key-linked terms become `LEFT JOIN ... ON ...` clauses, and
/// link-less terms (independent array accesses) are appended as bare
/// comma-joined clauses. Returns the fragment and the root alias.
///
/// A query with no resolves still needs a root: falls back to the schema's
/// own declared relation, or a dummy `(SELECT NULL)` if none.
pub fn join_fragment(terms: &[JoinTerm], schema: &Value) -> Result<(String, String), QueryError> {
    let (first, rest) = match terms.split_first() {
        Some(split) => split,
        None => {
            let root_props = SearchProps::from_schema(schema);
            let relation = root_props
                .database
                .and_then(|db| db.relation)
                .map(|r| quote_ident(&r))
                .unwrap_or_else(|| "(SELECT NULL)".to_string());
            let alias = quote_ident(ROOT);
            return Ok((format!("{} AS {}", relation, alias), ROOT.to_string()));
        }
    };

    let mut fragment = format!(
        "{} AS {}",
        first.relation.as_ref().expect("join terms carry relations"),
        quote_ident(&first.alias)
    );

    for term in rest {
        let relation = term.relation.as_ref().expect("join terms carry relations");
        match (&term.key_link, &term.parent_alias) {
            (Some((parent_key, child_key)), Some(parent_alias)) => {
                fragment.push_str(&format!(
                    " LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                    relation,
                    quote_ident(&term.alias),
                    quote_ident(parent_alias),
                    quote_ident(parent_key),
                    quote_ident(&term.alias),
                    quote_ident(child_key),
                ));
            }
            _ => {
                fragment.push_str(&format!(", {} AS {}", relation, quote_ident(&term.alias)));
            }
        }
    }

    Ok((fragment, first.alias.clone()))
}

// ========================================
// AST -> WHERE compilation
// ========================================

fn push_param(params: &mut Vec<SqlParam>, param: SqlParam) -> String {
    params.push(param);
    format!("${}", params.len())
}

fn infix(op: &str, left: String, right: String) -> String {
    format!("({}) {} ({})", left, op, right)
}

/// Compile an AST node into a SQL boolean/value expression, accumulating
/// placeholder parameters in left-to-right traversal order.
fn compile_expr(
    ast: &Ast,
    schema: &Value,
    params: &mut Vec<SqlParam>,
) -> Result<String, QueryError> {
    let expr = match ast {
        Ast::Literal(lit) => return Ok(push_param(params, SqlParam::Literal(lit.clone()))),
        Ast::Expression(expr) => expr,
    };
    let args = expr.args();

    match expr.function() {
        Function::And => Ok(infix(
            "AND",
            compile_expr(&args[0], schema, params)?,
            compile_expr(&args[1], schema, params)?,
        )),
        Function::Or => Ok(infix(
            "OR",
            compile_expr(&args[0], schema, params)?,
            compile_expr(&args[1], schema, params)?,
        )),
        Function::Not => Ok(format!("NOT ({})", compile_expr(&args[0], schema, params)?)),

        Function::Eq => compile_comparison("=", args, schema, params),
        Function::Lt => compile_comparison("<", args, schema, params),
        Function::Le => compile_comparison("<=", args, schema, params),
        Function::Gt => compile_comparison(">", args, schema, params),
        Function::Ge => compile_comparison(">=", args, schema, params),

        // Containment/prefix/suffix run through the internal wildcard
        // builder; this is the only place #_wc is produced.
        Function::Co => compile_pattern_match("LIKE", "contains", args, schema, params),
        Function::Ico => compile_pattern_match("ILIKE", "contains", args, schema, params),
        Function::Isw => compile_pattern_match("ILIKE", "starts_with", args, schema, params),
        Function::Iew => compile_pattern_match("ILIKE", "ends_with", args, schema, params),
        Function::Like => compile_comparison("LIKE", args, schema, params),
        Function::Ilike => compile_comparison("ILIKE", args, schema, params),

        Function::In => Ok(infix(
            "IN",
            compile_expr(&args[0], schema, params)?,
            compile_expr(&args[1], schema, params)?,
        )),

        Function::Resolve => {
            let segments = ast.resolve_segments()?;
            let terms = collect_resolve_join_tables(&segments, schema)?;
            let last = terms.last().expect("chain always has a root term");
            Ok(match &last.field {
                Some(field) => format!("{}.{}", quote_ident(&last.alias), quote_ident(field)),
                None => format!("{}.*", quote_ident(&last.alias)),
            })
        }

        Function::List => {
            let values = args
                .iter()
                .map(|arg| match arg {
                    Ast::Literal(lit) => Ok(lit.clone()),
                    other => Err(QueryError::Type(format!(
                        "#list elements must be literals, got {}",
                        other
                    ))),
                })
                .collect::<Result<Vec<Literal>, QueryError>>()?;
            Ok(push_param(params, SqlParam::Array(values)))
        }

        Function::Wildcard => compile_wildcard(args, params),
    }
}

fn compile_comparison(
    op: &str,
    args: &[Ast],
    schema: &Value,
    params: &mut Vec<SqlParam>,
) -> Result<String, QueryError> {
    Ok(infix(
        op,
        compile_expr(&args[0], schema, params)?,
        compile_expr(&args[1], schema, params)?,
    ))
}

fn compile_pattern_match(
    op: &str,
    mode: &str,
    args: &[Ast],
    schema: &Value,
    params: &mut Vec<SqlParam>,
) -> Result<String, QueryError> {
    let lhs = compile_expr(&args[0], schema, params)?;
    let wildcard = Ast::expression(
        Function::Wildcard,
        vec![args[1].clone(), Ast::from(mode)],
    )?;
    let rhs = compile_expr(&wildcard, schema, params)?;
    Ok(infix(op, lhs, rhs))
}

/// Build a `LIKE`/`ILIKE` pattern parameter from a literal value. Literal
/// `%` in the value is escaped (and only `%`; the in-memory backend's
/// regex translator is stricter, and that asymmetry is preserved).
fn compile_wildcard(args: &[Ast], params: &mut Vec<SqlParam>) -> Result<String, QueryError> {
    let value = match &args[0] {
        Ast::Literal(Literal::String(s)) => s.clone(),
        Ast::Literal(other) => other.to_string(),
        other => {
            return Err(QueryError::Type(format!(
                "Pattern matching requires a literal value, got sub-expression {}",
                other
            )))
        }
    };
    let mode = match &args[1] {
        Ast::Literal(Literal::String(s)) => s.as_str(),
        _ => return Err(QueryError::Type("#_wc mode must be a string literal".to_string())),
    };

    let escaped = value.replace('%', "\\%");
    let pattern = match mode {
        "contains" => format!("%{}%", escaped),
        "starts_with" => format!("{}%", escaped),
        "ends_with" => format!("%{}", escaped),
        other => {
            return Err(QueryError::Type(format!(
                "Unknown #_wc mode: {:?}",
                other
            )))
        }
    };
    Ok(push_param(
        params,
        SqlParam::Literal(Literal::String(pattern)),
    ))
}

// ========================================
// Top-level entry points
// ========================================

/// Compile an already-converted AST into a complete parameterized
/// `SELECT` statement. Runs the permission check (backed by join
/// collection) before compiling, so relational compilation enforces the
/// identical access-control contract as in-memory evaluation.
pub fn compile_ast_to_sql(
    ast: &Ast,
    schema: &Value,
    internal: bool,
) -> Result<CompiledQuery, QueryError> {
    check_ast_permissions(
        ast,
        schema,
        &mut |path, sch| {
            let terms = collect_resolve_join_tables(path, sch)?;
            Ok(terms.last().expect("chain always has a root term").search.clone())
        },
        internal,
    )?;

    let terms = collect_join_tables(ast, schema)?;
    let (from_fragment, root_alias) = join_fragment(&terms, schema)?;

    let mut params = Vec::new();
    let condition = compile_expr(ast, schema, &mut params)?;

    Ok(CompiledQuery {
        sql: format!(
            "SELECT {}.* FROM {} WHERE {}",
            quote_ident(&root_alias),
            from_fragment,
            condition
        ),
        params,
    })
}

/// Convert a raw query payload and compile it into a parameterized
/// `SELECT` statement.
///
/// # Examples
///
/// ```
/// use caraway::postgres::search_query_to_sql;
/// use serde_json::json;
///
/// let schema = json!({
///     "type": "object",
///     "search": {"database": {"relation": "patients", "primary_key": "id"}},
///     "properties": {
///         "karyotypic_sex": {
///             "type": "string",
///             "search": {"queryable": "all", "operations": ["eq"]}
///         }
///     }
/// });
/// let compiled = search_query_to_sql(
///     &json!(["#eq", ["#resolve", "karyotypic_sex"], "XO"]),
///     &schema,
///     false,
/// ).unwrap();
/// assert_eq!(
///     compiled.sql,
///     r#"SELECT "_root".* FROM "patients" AS "_root" WHERE ("_root"."karyotypic_sex") = ($1)"#
/// );
/// ```
pub fn search_query_to_sql(
    query: &Value,
    schema: &Value,
    internal: bool,
) -> Result<CompiledQuery, QueryError> {
    let ast = convert_query(query)?;
    compile_ast_to_sql(&ast, schema, internal)
}
