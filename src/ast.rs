//! # Caraway Query Language - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for caraway's filter
//! expression language: small s-expression-like queries over JSON documents
//! that can be evaluated in-memory or compiled to SQL.
//!
//! ## Architecture Overview
//!
//! The AST module is organized into focused submodules:
//!
//! - **[functions]** - The recognized function set and its arity table
//! - **[nodes]** - AST nodes (literals and function expressions)
//! - **[normalize]** - Normalization passes and AND-chain utilities
//!
//! ## Quick Start
//!
//! ```text
//! ["#eq", ["#resolve", "subject", "karyotypic_sex"], "XO"]
//! ```
//!
//! This query matches documents whose `subject.karyotypic_sex` field equals
//! `"XO"`.
//!
//! ## Core Concepts
//!
//! ### Payload Structure
//!
//! Every query is a JSON array whose first element is a `#`-prefixed
//! function name and whose remaining elements are arguments (sub-arrays or
//! scalar literals):
//!
//! ```text
//! ["#and", <query>, <query>]
//! ```
//!
//! ### Field Resolution
//!
//! `#resolve` names a value location as a path of field names, with the
//! special marker `[item]` standing for "some element" of an array:
//!
//! ```text
//! ["#resolve", "biosamples", "[item]", "procedure", "code", "id"]
//! ```
//!
//! The evaluator tries every combination of array indices; the SQL compiler
//! turns the same path into a chain of joins. Both backends agree on every
//! value the language can express.
//!
//! ### Normalization
//!
//! Converted queries are normalized: `["#not", ["#not", x]]` collapses to
//! `x`, recursively. [normalize] also provides flatten/rebuild utilities
//! for chains of binary `#and` expressions.

pub mod functions;
pub mod nodes;
pub mod normalize;

pub use functions::Function;
pub use nodes::{Ast, Expression, Literal};
pub use normalize::{and_list_to_ast, ast_to_and_list, simplify};
