pub mod ast;
pub mod convert;
pub mod error;
pub mod evaluator;
pub mod permissions;
pub mod postgres;
pub mod response;
pub mod schema;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Ast, Expression, Function, Literal};
pub use convert::convert_query;
pub use error::QueryError;
pub use evaluator::{check_ast_against_data_structure, EvaluateOptions, IndexCombination};
pub use postgres::{search_query_to_sql, CompiledQuery, SqlParam};
pub use response::{perform_search, QueryResponse, ResponseSpec};
pub use schema::{Queryable, SearchProps};
