//! A programmatic combinator API for building formulas (spec.md §6
//! "[ADDED] programmatic formula construction"): since the crate carries no
//! concrete-syntax formula parser, callers assemble constraints the way
//! Python callers use `isla_shortcuts` — small free functions that return
//! [`Formula`]/[`SmtTerm`]/[`PredicateArg`] values to compose.

use crate::context::Context;
use crate::formula::{Formula, PredicateArg, RangeExpr, SmtAtom, SmtTerm};
use crate::variable::{BindElement, BindExpression, Variable};

pub fn var_term(var: &Variable) -> SmtTerm {
    SmtTerm::Var(var.clone())
}

pub fn str_lit(s: impl Into<String>) -> SmtTerm {
    SmtTerm::StringLiteral(s.into())
}

pub fn int_lit(n: i64) -> SmtTerm {
    SmtTerm::IntLiteral(n)
}

pub fn app(op: impl Into<String>, args: Vec<SmtTerm>) -> SmtTerm {
    SmtTerm::App(op.into(), args)
}

/// An SMT conjunct, e.g. `smt("=", vec![var_term(&x), str_lit("y")])`.
pub fn smt(op: impl Into<String>, args: Vec<SmtTerm>) -> Formula {
    Formula::Smt(SmtAtom::new(op, args))
}

pub fn and(parts: Vec<Formula>) -> Formula {
    Formula::and(parts)
}

pub fn or(parts: Vec<Formula>) -> Formula {
    Formula::or(parts)
}

pub fn not(inner: Formula) -> Formula {
    Formula::not(inner)
}

fn structural(name: &str, args: Vec<PredicateArg>) -> Formula {
    Formula::StructuralPredicate { name: name.to_string(), args }
}

pub fn before(a: &Variable, b: &Variable) -> Formula {
    structural("before", vec![PredicateArg::Var(a.clone()), PredicateArg::Var(b.clone())])
}

pub fn after(a: &Variable, b: &Variable) -> Formula {
    structural("after", vec![PredicateArg::Var(a.clone()), PredicateArg::Var(b.clone())])
}

pub fn same_position(a: &Variable, b: &Variable) -> Formula {
    structural("same_position", vec![PredicateArg::Var(a.clone()), PredicateArg::Var(b.clone())])
}

pub fn different_position(a: &Variable, b: &Variable) -> Formula {
    structural("different_position", vec![PredicateArg::Var(a.clone()), PredicateArg::Var(b.clone())])
}

pub fn level(kind: impl Into<String>, a: &Variable, b: &Variable) -> Formula {
    structural(
        "level",
        vec![PredicateArg::Literal(kind.into()), PredicateArg::Var(a.clone()), PredicateArg::Var(b.clone())],
    )
}

fn semantic(name: &str, args: Vec<PredicateArg>, binds_tree: bool) -> Formula {
    Formula::SemanticPredicate { name: name.to_string(), args, binds_tree }
}

/// `count(tree, needle_nonterminal, n)`: binds the free numeric constant
/// `n`, not a subtree, so `binds_tree` is false (spec.md §4.5).
pub fn count(tree: &Variable, needle_nonterminal: impl Into<String>, n: &Variable) -> Formula {
    semantic(
        "count",
        vec![
            PredicateArg::Var(tree.clone()),
            PredicateArg::Literal(needle_nonterminal.into()),
            PredicateArg::Var(n.clone()),
        ],
        false,
    )
}

pub fn crop(source: &Variable, target: &Variable) -> Formula {
    semantic("crop", vec![PredicateArg::Var(source.clone()), PredicateArg::Var(target.clone())], true)
}

pub fn ljust(width: i64, source: &Variable, target: &Variable) -> Formula {
    semantic(
        "ljust",
        vec![PredicateArg::Literal(width.to_string()), PredicateArg::Var(source.clone()), PredicateArg::Var(target.clone())],
        true,
    )
}

pub fn rjust(width: i64, source: &Variable, target: &Variable) -> Formula {
    semantic(
        "rjust",
        vec![PredicateArg::Literal(width.to_string()), PredicateArg::Var(source.clone()), PredicateArg::Var(target.clone())],
        true,
    )
}

pub fn ljust_crop(width: i64, source: &Variable, target: &Variable) -> Formula {
    semantic(
        "ljust_crop",
        vec![PredicateArg::Literal(width.to_string()), PredicateArg::Var(source.clone()), PredicateArg::Var(target.clone())],
        true,
    )
}

pub fn rjust_crop(width: i64, source: &Variable, target: &Variable) -> Formula {
    semantic(
        "rjust_crop",
        vec![PredicateArg::Literal(width.to_string()), PredicateArg::Var(source.clone()), PredicateArg::Var(target.clone())],
        true,
    )
}

pub fn octal_to_decimal(source: &Variable, target: &Variable) -> Formula {
    semantic("octal_to_decimal", vec![PredicateArg::Var(source.clone()), PredicateArg::Var(target.clone())], true)
}

/// Bind a named variable at a shape position.
pub fn bind_var(var: &Variable) -> BindElement {
    BindElement::Var(var.clone())
}

/// Bind a literal fragment at a shape position.
pub fn bind_lit(text: impl Into<String>) -> BindElement {
    BindElement::Literal(text.into())
}

pub fn bind(elements: Vec<BindElement>) -> BindExpression {
    BindExpression::new(elements)
}

/// `forall var in range: body`, ranging over the goal tree or an enclosing
/// bound variable (spec.md §4.2).
pub fn forall(var: Variable, range: &Variable, body: Formula) -> Formula {
    Formula::Forall { var, bind: None, range: RangeExpr::Var(range.clone()), body: Box::new(body) }
}

pub fn forall_bind(var: Variable, bind: BindExpression, range: &Variable, body: Formula) -> Formula {
    Formula::Forall { var, bind: Some(bind), range: RangeExpr::Var(range.clone()), body: Box::new(body) }
}

pub fn exists(var: Variable, range: &Variable, body: Formula) -> Formula {
    Formula::Exists { var, bind: None, range: RangeExpr::Var(range.clone()), body: Box::new(body) }
}

pub fn exists_bind(var: Variable, bind: BindExpression, range: &Variable, body: Formula) -> Formula {
    Formula::Exists { var, bind: Some(bind), range: RangeExpr::Var(range.clone()), body: Box::new(body) }
}

/// A fresh anonymous variable for a bind-expression dummy position.
pub fn dummy(ctx: &mut Context, nonterminal: impl Into<String>) -> Variable {
    Variable::dummy(ctx, nonterminal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    #[test]
    fn forall_over_goal_builds_expected_shape() {
        let goal = Variable::goal();
        let x = Variable::bound("x", "<var>");
        let f = forall(x.clone(), &goal, same_position(&x, &goal));
        match f {
            Formula::Forall { var, range, .. } => {
                assert_eq!(var, x);
                assert_eq!(range.variable(), Some(&goal));
            }
            _ => panic!("expected Forall"),
        }
    }

    #[test]
    fn and_collapses_single_true() {
        assert_eq!(and(vec![Formula::True]), Formula::True);
    }

    #[test]
    fn count_predicate_does_not_bind_tree() {
        let tree = Variable::goal();
        let n = Variable::constant("n", crate::variable::NUM_TYPE);
        match count(&tree, "<digit>", &n) {
            Formula::SemanticPredicate { binds_tree, .. } => assert!(!binds_tree),
            _ => panic!("expected SemanticPredicate"),
        }
    }
}
