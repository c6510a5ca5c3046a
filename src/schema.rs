//! Schema annotations and schema-guided navigation.
//!
//! Queries are governed by a standard JSON Schema (`type`, `properties`,
//! `items`) where any node may carry a `search` object:
//!
//! ```text
//! {
//!   "type": "string",
//!   "search": {
//!     "queryable": "all",            // "none" | "all" | "internal"
//!     "operations": ["eq", "co"],    // allowed operation names
//!     "database": {                  // relational backend only
//!       "field": "karyotypic_sex"
//!     }
//!   }
//! }
//! ```
//!
//! This module parses those annotations into typed values, implements the
//! path-stepping rules shared by both backends (`[item]` only on arrays,
//! field names only on objects, nothing on scalars), and provides a minimal
//! structural validator for checking a concrete document against its
//! schema.

use serde_json::Value;

use crate::{
    ast::{nodes::json_type_name, Function},
    error::QueryError,
};

/// Path segment marking "some element" of an array.
pub const ITEM: &str = "[item]";

/// Synthetic root segment prefixed to resolve paths.
pub const ROOT: &str = "_root";

/// Visibility tier of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queryable {
    /// Never queryable (the default when no tier is declared)
    None,
    /// Queryable by any caller
    All,
    /// Queryable only with elevated (internal) access
    Internal,
}

impl Queryable {
    pub fn from_name(name: &str) -> Option<Queryable> {
        match name {
            "none" => Some(Queryable::None),
            "all" => Some(Queryable::All),
            "internal" => Some(Queryable::Internal),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Queryable::None => "none",
            Queryable::All => "all",
            Queryable::Internal => "internal",
        }
    }

    /// Whether a caller at the given access level may query this tier.
    pub fn visible(&self, internal: bool) -> bool {
        match self {
            Queryable::None => false,
            Queryable::All => true,
            Queryable::Internal => internal,
        }
    }
}

/// Structural database type used to synthesize a relation on the fly when
/// no explicit `relation` is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Json,
    Jsonb,
    Array,
}

impl RelationKind {
    pub fn from_name(name: &str) -> Option<RelationKind> {
        match name {
            "json" => Some(RelationKind::Json),
            "jsonb" => Some(RelationKind::Jsonb),
            "array" => Some(RelationKind::Array),
            _ => None,
        }
    }
}

/// How a node's relation links to its parent's relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relationship {
    ManyToOne {
        foreign_key: String,
    },
    OneToMany {
        parent_primary_key: String,
        parent_foreign_key: String,
    },
    ManyToMany {
        parent_primary_key: String,
        parent_foreign_key: String,
    },
}

/// Relational mapping of a schema node (`search.database`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DatabaseProps {
    /// Explicit table name, if any
    pub relation: Option<String>,
    /// Structural type for on-the-fly relation synthesis
    pub kind: Option<RelationKind>,
    /// Column/key name; defaults to the schema property name
    pub field: Option<String>,
    pub primary_key: Option<String>,
    pub relationship: Option<Relationship>,
}

/// The parsed `search` annotation of a schema node.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchProps {
    pub queryable: Queryable,
    pub operations: Vec<Function>,
    pub database: Option<DatabaseProps>,
}

impl SearchProps {
    /// Parse the `search` object of a schema node. A node with no `search`
    /// key (or a malformed one) is not queryable and allows no operations.
    pub fn from_schema(schema_node: &Value) -> SearchProps {
        let search = schema_node.get("search");

        let queryable = search
            .and_then(|s| s.get("queryable"))
            .and_then(Value::as_str)
            .and_then(Queryable::from_name)
            .unwrap_or(Queryable::None);

        let operations = search
            .and_then(|s| s.get("operations"))
            .and_then(Value::as_array)
            .map(|ops| {
                ops.iter()
                    .filter_map(Value::as_str)
                    .filter_map(Function::from_operation_name)
                    .collect()
            })
            .unwrap_or_default();

        let database = search.and_then(|s| s.get("database")).map(parse_database);

        SearchProps {
            queryable,
            operations,
            database,
        }
    }

    /// Whether this field declares the given operation as allowed.
    pub fn allows_operation(&self, fn_: Function) -> bool {
        self.operations.contains(&fn_)
    }
}

fn parse_database(db: &Value) -> DatabaseProps {
    DatabaseProps {
        relation: db.get("relation").and_then(Value::as_str).map(String::from),
        kind: db
            .get("type")
            .and_then(Value::as_str)
            .and_then(RelationKind::from_name),
        field: db.get("field").and_then(Value::as_str).map(String::from),
        primary_key: db
            .get("primary_key")
            .and_then(Value::as_str)
            .map(String::from),
        relationship: db.get("relationship").and_then(parse_relationship),
    }
}

fn parse_relationship(rel: &Value) -> Option<Relationship> {
    let get = |key: &str| rel.get(key).and_then(Value::as_str).map(String::from);
    match rel.get("type").and_then(Value::as_str)? {
        "MANY_TO_ONE" => Some(Relationship::ManyToOne {
            foreign_key: get("foreign_key")?,
        }),
        "ONE_TO_MANY" => Some(Relationship::OneToMany {
            parent_primary_key: get("parent_primary_key")?,
            parent_foreign_key: get("parent_foreign_key")?,
        }),
        "MANY_TO_MANY" => Some(Relationship::ManyToMany {
            parent_primary_key: get("parent_primary_key")?,
            parent_foreign_key: get("parent_foreign_key")?,
        }),
        _ => None,
    }
}

/// Declared `type` of a schema node, if any.
pub fn schema_type(schema_node: &Value) -> Option<&str> {
    schema_node.get("type").and_then(Value::as_str)
}

/// Step a schema node by one resolve-path segment.
///
/// `[item]` steps into an array schema's `items`; any other segment steps
/// into an object schema's `properties`. Illegal steps (indexing a
/// non-array, naming a field on an array, stepping into a scalar, or
/// naming a missing property) are value errors.
pub fn step_schema<'a>(schema_node: &'a Value, segment: &str) -> Result<&'a Value, QueryError> {
    let type_ = schema_type(schema_node);

    if segment == ITEM {
        if type_ != Some("array") {
            return Err(QueryError::Value(format!(
                "Cannot index into non-array schema type {:?} with {}",
                type_.unwrap_or("unknown"),
                ITEM
            )));
        }
        return schema_node.get("items").ok_or_else(|| {
            QueryError::Value("Array schema is missing an items definition".to_string())
        });
    }

    match type_ {
        Some("array") => Err(QueryError::Value(format!(
            "Cannot access field {:?} on an array schema; use {}",
            segment, ITEM
        ))),
        Some("object") | None => {
            let properties = schema_node.get("properties").ok_or_else(|| {
                QueryError::Value(format!(
                    "Cannot access field {:?} on a schema with no declared properties",
                    segment
                ))
            })?;
            properties.get(segment).ok_or_else(|| {
                QueryError::Value(format!("Field {:?} not found in schema properties", segment))
            })
        }
        Some(scalar) => Err(QueryError::Value(format!(
            "Cannot access field {:?} on scalar schema type {:?}",
            segment, scalar
        ))),
    }
}

/// Walk a schema by a whole resolve path.
pub fn walk_schema<'a>(schema: &'a Value, path: &[String]) -> Result<&'a Value, QueryError> {
    let mut node = schema;
    for segment in path {
        node = step_schema(node, segment)?;
    }
    Ok(node)
}

/// Fetch the `search` properties of the field a resolve path points at.
pub fn search_props_for_path(schema: &Value, path: &[String]) -> Result<SearchProps, QueryError> {
    Ok(SearchProps::from_schema(walk_schema(schema, path)?))
}

/// Structurally validate a concrete data structure against its schema.
///
/// Checks `type` tags, declared `properties` (plus a `required` list when
/// present), and array `items`, recursively. This is deliberately not a
/// full JSON-Schema validator; it covers the structure the query engine
/// itself depends on.
///
/// With `secure_errors` the failure message omits data and schema contents,
/// so it can be surfaced to callers without leaking field values.
pub fn validate_data_structure(
    data: &Value,
    schema: &Value,
    secure_errors: bool,
) -> Result<(), QueryError> {
    validate_node(data, schema, ROOT).map_err(|verbose| {
        if secure_errors {
            QueryError::SchemaMismatch(
                "Data structure does not match the declared schema".to_string(),
            )
        } else {
            QueryError::SchemaMismatch(verbose)
        }
    })
}

fn validate_node(data: &Value, schema: &Value, path: &str) -> Result<(), String> {
    let type_ = match schema_type(schema) {
        Some(t) => t,
        None => return Ok(()), // untyped schema node matches anything
    };

    let matches = match type_ {
        "object" => data.is_object(),
        "array" => data.is_array(),
        "string" => data.is_string(),
        "integer" => data.is_i64() || data.is_u64(),
        "number" => data.is_number(),
        "boolean" => data.is_boolean(),
        "null" => data.is_null(),
        _ => true,
    };
    if !matches {
        return Err(format!(
            "At {}: expected {}, got {} ({})",
            path,
            type_,
            json_type_name(data),
            data
        ));
    }

    match (data, type_) {
        (Value::Object(map), "object") => {
            if let Some(required) = schema.get("required").and_then(Value::as_array) {
                for key in required.iter().filter_map(Value::as_str) {
                    if !map.contains_key(key) {
                        return Err(format!("At {}: missing required property {:?}", path, key));
                    }
                }
            }
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (key, child_schema) in properties {
                    if let Some(child) = map.get(key) {
                        validate_node(child, child_schema, &format!("{}.{}", path, key))?;
                    }
                }
            }
            Ok(())
        }
        (Value::Array(items), "array") => {
            if let Some(item_schema) = schema.get("items") {
                for (i, item) in items.iter().enumerate() {
                    validate_node(item, item_schema, &format!("{}[{}]", path, i))?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
