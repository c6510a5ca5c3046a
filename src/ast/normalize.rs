//! AST normalization passes and AND-chain utilities.

use crate::{
    ast::{Ast, Expression, Function},
    error::QueryError,
};

/// Recursively collapse `#not(#not(x))` into `x`, leaving all other nodes
/// structurally unchanged.
pub fn simplify(ast: Ast) -> Ast {
    match ast {
        Ast::Literal(_) => ast,
        Ast::Expression(expr) => {
            let fn_ = expr.function();
            let args: Vec<Ast> = expr.into_args().into_iter().map(simplify).collect();

            if fn_ == Function::Not {
                // Arguments are already simplified, so a single unwrapping
                // step here handles arbitrarily deep negation stacks.
                let arg = args.into_iter().next().expect("#not arity checked");
                return match arg {
                    Ast::Expression(inner) if inner.function() == Function::Not => {
                        inner.into_args().remove(0)
                    }
                    other => Ast::Expression(
                        Expression::new(Function::Not, vec![other]).expect("arity preserved"),
                    ),
                };
            }

            Ast::Expression(Expression::new(fn_, args).expect("arity preserved"))
        }
    }
}

/// Flatten a chain of binary `#and` expressions into a flat ordered list
/// of conjuncts. Works on both left- and right-nested chains; a node that
/// is not an `#and` is its own single conjunct.
pub fn ast_to_and_list(ast: &Ast) -> Vec<Ast> {
    match ast.as_expression_of(Function::And) {
        Some(expr) => expr.args().iter().flat_map(ast_to_and_list).collect(),
        None => vec![ast.clone()],
    }
}

/// Fold a list of conjuncts back into a right-nested chain of binary
/// `#and` expressions. Returns `None` for an empty list.
pub fn and_list_to_ast(conjuncts: &[Ast]) -> Result<Option<Ast>, QueryError> {
    let mut iter = conjuncts.iter().rev().cloned();
    let mut folded = match iter.next() {
        Some(last) => last,
        None => return Ok(None),
    };
    for conjunct in iter {
        folded = Ast::expression(Function::And, vec![conjunct, folded])?;
    }
    Ok(Some(folded))
}
