use crate::error::QueryError;

/// The recognized query functions.
///
/// Function names in query payloads carry a `#` prefix (`"#eq"`); schema
/// `operations` lists use the bare name (`"eq"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    // Boolean combinators
    /// Logical AND, short-circuiting (`#and`)
    And,
    /// Logical OR, short-circuiting (`#or`)
    Or,
    /// Logical negation (`#not`)
    Not,

    // Comparisons
    /// Less than (`#lt`)
    Lt,
    /// Less than or equal (`#le`)
    Le,
    /// Equal (`#eq`)
    Eq,
    /// Greater than (`#gt`)
    Gt,
    /// Greater than or equal (`#ge`)
    Ge,

    // Matching
    /// Substring containment, case-sensitive (`#co`)
    Co,
    /// Substring containment, case-insensitive (`#ico`)
    Ico,
    /// Membership in a `#list` (`#in`)
    In,
    /// Case-insensitive starts-with (`#isw`)
    Isw,
    /// Case-insensitive ends-with (`#iew`)
    Iew,
    /// SQL-style `%`/`_` wildcard match, case-sensitive (`#like`)
    Like,
    /// SQL-style `%`/`_` wildcard match, case-insensitive (`#ilike`)
    Ilike,

    // Structural
    /// A path of literal segments identifying a value location (`#resolve`)
    Resolve,
    /// A literal collection, used as the RHS of `#in` (`#list`)
    List,

    /// Wildcard-string builder (`#_wc`). Internal to the SQL compiler;
    /// illegal in user-supplied queries.
    Wildcard,
}

impl Function {
    /// The comparison/matching operations that schemas may allow on a
    /// field, i.e. everything except boolean combinators, structural
    /// functions, and the internal wildcard helper.
    pub const OPERATIONS: [Function; 12] = [
        Function::Lt,
        Function::Le,
        Function::Eq,
        Function::Gt,
        Function::Ge,
        Function::Co,
        Function::Ico,
        Function::In,
        Function::Isw,
        Function::Iew,
        Function::Like,
        Function::Ilike,
    ];

    /// Look up a function from its `#`-prefixed payload spelling.
    pub fn from_query_name(name: &str) -> Option<Function> {
        Some(match name {
            "#and" => Function::And,
            "#or" => Function::Or,
            "#not" => Function::Not,
            "#lt" => Function::Lt,
            "#le" => Function::Le,
            "#eq" => Function::Eq,
            "#gt" => Function::Gt,
            "#ge" => Function::Ge,
            "#co" => Function::Co,
            "#ico" => Function::Ico,
            "#in" => Function::In,
            "#isw" => Function::Isw,
            "#iew" => Function::Iew,
            "#like" => Function::Like,
            "#ilike" => Function::Ilike,
            "#resolve" => Function::Resolve,
            "#list" => Function::List,
            "#_wc" => Function::Wildcard,
            _ => return None,
        })
    }

    /// Look up an operation from its bare schema spelling (`"eq"`).
    /// Structural functions and the wildcard helper are not operations and
    /// have no bare spelling.
    pub fn from_operation_name(name: &str) -> Option<Function> {
        Function::from_query_name(&format!("#{}", name)).filter(Function::is_operation)
    }

    /// The `#`-prefixed payload spelling.
    pub fn query_name(&self) -> &'static str {
        match self {
            Function::And => "#and",
            Function::Or => "#or",
            Function::Not => "#not",
            Function::Lt => "#lt",
            Function::Le => "#le",
            Function::Eq => "#eq",
            Function::Gt => "#gt",
            Function::Ge => "#ge",
            Function::Co => "#co",
            Function::Ico => "#ico",
            Function::In => "#in",
            Function::Isw => "#isw",
            Function::Iew => "#iew",
            Function::Like => "#like",
            Function::Ilike => "#ilike",
            Function::Resolve => "#resolve",
            Function::List => "#list",
            Function::Wildcard => "#_wc",
        }
    }

    /// The bare spelling used in schema `operations` lists.
    pub fn operation_name(&self) -> &'static str {
        &self.query_name()[1..]
    }

    /// Declared argument count range as `(min, max)`; `None` means
    /// unbounded.
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Function::And | Function::Or => (2, Some(2)),
            Function::Not => (1, Some(1)),
            Function::Lt
            | Function::Le
            | Function::Eq
            | Function::Gt
            | Function::Ge
            | Function::Co
            | Function::Ico
            | Function::In
            | Function::Isw
            | Function::Iew
            | Function::Like
            | Function::Ilike => (2, Some(2)),
            Function::Resolve => (0, None),
            Function::List => (1, None),
            Function::Wildcard => (2, Some(2)),
        }
    }

    /// True for the comparison/matching operations a schema can allow on a
    /// field (see [`Function::OPERATIONS`]).
    pub fn is_operation(&self) -> bool {
        Function::OPERATIONS.contains(self)
    }

    /// Validate an argument count against this function's declared arity.
    pub fn check_arity(&self, n_args: usize) -> Result<(), QueryError> {
        let (min, max) = self.arity();
        if n_args < min || max.is_some_and(|m| n_args > m) {
            return Err(QueryError::Syntax(format!(
                "{} takes {} argument(s), got {}",
                self.query_name(),
                match max {
                    Some(m) if m == min => format!("exactly {}", min),
                    Some(m) => format!("{} to {}", min, m),
                    None => format!("at least {}", min),
                },
                n_args
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.query_name())
    }
}
