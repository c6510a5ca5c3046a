//! Error types for query processing.

/// Errors raised while converting, checking, evaluating, or compiling a
/// query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Malformed query structure: unrecognized function, wrong arity,
    /// non-string expression head
    Syntax(String),

    /// A value-level problem: unknown field, disallowed access, bad
    /// literal, unsatisfiable relational mapping
    Value(String),

    /// An operation applied to operands of the wrong type
    Type(String),

    /// A missing or out-of-range array index binding
    IndexBinding(String),

    /// The data structure does not match its declared schema
    SchemaMismatch(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            QueryError::Value(msg) => write!(f, "Value error: {}", msg),
            QueryError::Type(msg) => write!(f, "Type error: {}", msg),
            QueryError::IndexBinding(msg) => write!(f, "Index binding error: {}", msg),
            QueryError::SchemaMismatch(msg) => write!(f, "Schema mismatch: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}
