use serde_json::Value;

use crate::{ast::Function, error::QueryError};

/// A scalar literal in a query.
///
/// Queries support exactly four literal types; `null`, objects, and bare
/// arrays are not valid query literals. Equality is value-based.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// UTF-8 string
    String(String),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number
    Float(f64),

    /// Boolean (true/false)
    Boolean(bool),
}

impl Literal {
    /// Convert a JSON scalar into a literal. Returns a value error for
    /// null, objects, arrays, and numbers that fit neither i64 nor f64.
    pub fn from_json(value: &Value) -> Result<Literal, QueryError> {
        match value {
            Value::String(s) => Ok(Literal::String(s.clone())),
            Value::Bool(b) => Ok(Literal::Boolean(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Literal::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Literal::Float(f))
                } else {
                    Err(QueryError::Value(format!(
                        "Unrepresentable numeric literal: {}",
                        n
                    )))
                }
            }
            v => Err(QueryError::Value(format!(
                "Unsupported literal type: {}",
                json_type_name(v)
            ))),
        }
    }

    /// The JSON value this literal denotes.
    pub fn to_json(&self) -> Value {
        match self {
            Literal::String(s) => Value::String(s.clone()),
            Literal::Integer(i) => Value::from(*i),
            Literal::Float(f) => Value::from(*f),
            Literal::Boolean(b) => Value::Bool(*b),
        }
    }

    /// The string content, if this is a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// A function application: a recognized function plus its ordered
/// arguments. Construction validates the argument count against the
/// function's declared arity.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    fn_: Function,
    args: Vec<Ast>,
}

impl Expression {
    /// Build an expression, checking arity. Returns a syntax error when the
    /// argument count falls outside the function's declared range.
    pub fn new(fn_: Function, args: Vec<Ast>) -> Result<Expression, QueryError> {
        fn_.check_arity(args.len())?;
        Ok(Expression { fn_, args })
    }

    pub fn function(&self) -> Function {
        self.fn_
    }

    pub fn args(&self) -> &[Ast] {
        &self.args
    }

    /// Consume the expression, yielding its arguments.
    pub fn into_args(self) -> Vec<Ast> {
        self.args
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}", self.fn_)?;
        for arg in &self.args {
            write!(f, ", {}", arg)?;
        }
        write!(f, "]")
    }
}

/// An AST node: either a scalar literal or a function expression.
///
/// All nodes are immutable value objects constructed once per query.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Literal(Literal),
    Expression(Expression),
}

impl Ast {
    /// Shorthand for building an expression node.
    pub fn expression(fn_: Function, args: Vec<Ast>) -> Result<Ast, QueryError> {
        Ok(Ast::Expression(Expression::new(fn_, args)?))
    }

    /// The expression, if this node is one with the given function.
    pub fn as_expression_of(&self, fn_: Function) -> Option<&Expression> {
        match self {
            Ast::Expression(e) if e.function() == fn_ => Some(e),
            _ => None,
        }
    }

    /// The string segments of a `#resolve` node. Returns a syntax error if
    /// any segment is not a string literal.
    pub fn resolve_segments(&self) -> Result<Vec<String>, QueryError> {
        let expr = self.as_expression_of(Function::Resolve).ok_or_else(|| {
            QueryError::Syntax(format!("Expected a #resolve expression, got {}", self))
        })?;
        expr.args()
            .iter()
            .map(|a| match a {
                Ast::Literal(Literal::String(s)) => Ok(s.clone()),
                other => Err(QueryError::Syntax(format!(
                    "#resolve segments must be strings, got {}",
                    other
                ))),
            })
            .collect()
    }
}

impl std::fmt::Display for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ast::Literal(lit) => write!(f, "{}", lit),
            Ast::Expression(expr) => write!(f, "{}", expr),
        }
    }
}

impl From<Literal> for Ast {
    fn from(lit: Literal) -> Ast {
        Ast::Literal(lit)
    }
}

impl From<&str> for Ast {
    fn from(s: &str) -> Ast {
        Ast::Literal(Literal::String(s.to_string()))
    }
}

impl From<i64> for Ast {
    fn from(i: i64) -> Ast {
        Ast::Literal(Literal::Integer(i))
    }
}

impl From<f64> for Ast {
    fn from(x: f64) -> Ast {
        Ast::Literal(Literal::Float(x))
    }
}

impl From<bool> for Ast {
    fn from(b: bool) -> Ast {
        Ast::Literal(Literal::Boolean(b))
    }
}

/// Returns a human-readable type name for a JSON value
pub(crate) fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
