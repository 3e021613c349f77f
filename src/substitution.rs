//! Capture-free substitution, normal forms, dead-quantifier elimination and
//! well-formedness checking over [`Formula`] values (spec.md §4.2).

use std::collections::HashSet;

use crate::context::Context;
use crate::error::SolverError;
use crate::formula::{Formula, PredicateArg, RangeExpr, SmtAtom, SmtTerm};
use crate::tree::DerivationTree;
use crate::variable::Variable;

fn substitute_term(term: &SmtTerm, var: &Variable, tree: &DerivationTree) -> SmtTerm {
    match term {
        SmtTerm::Var(v) if v == var => SmtTerm::Tree(tree.clone()),
        SmtTerm::Var(_) | SmtTerm::StringLiteral(_) | SmtTerm::IntLiteral(_) | SmtTerm::Tree(_) => {
            term.clone()
        }
        SmtTerm::App(op, args) => {
            SmtTerm::App(op.clone(), args.iter().map(|a| substitute_term(a, var, tree)).collect())
        }
    }
}

fn substitute_arg(arg: &PredicateArg, var: &Variable, tree: &DerivationTree) -> PredicateArg {
    match arg {
        PredicateArg::Var(v) if v == var => PredicateArg::Tree(tree.clone()),
        other => other.clone(),
    }
}

/// Replace every free occurrence of `var` in `formula` by `tree`,
/// descending into quantifier bodies and renaming a nested bound variable
/// out of the way first if it happens to share `var`'s name (capture
/// avoidance; well-formedness ordinarily prevents this from ever firing).
pub fn substitute(ctx: &mut Context, formula: &Formula, var: &Variable, tree: &DerivationTree) -> Formula {
    match formula {
        Formula::True | Formula::False => formula.clone(),
        Formula::Smt(atom) => Formula::Smt(SmtAtom {
            op: atom.op.clone(),
            args: atom.args.iter().map(|t| substitute_term(t, var, tree)).collect(),
        }),
        Formula::StructuralPredicate { name, args } => Formula::StructuralPredicate {
            name: name.clone(),
            args: args.iter().map(|a| substitute_arg(a, var, tree)).collect(),
        },
        Formula::SemanticPredicate { name, args, binds_tree } => Formula::SemanticPredicate {
            name: name.clone(),
            args: args.iter().map(|a| substitute_arg(a, var, tree)).collect(),
            binds_tree: *binds_tree,
        },
        Formula::And(parts) => Formula::and(parts.iter().map(|p| substitute(ctx, p, var, tree)).collect()),
        Formula::Or(parts) => Formula::or(parts.iter().map(|p| substitute(ctx, p, var, tree)).collect()),
        Formula::Not(inner) => Formula::not(substitute(ctx, inner, var, tree)),
        Formula::Forall { var: qvar, bind, range, body } | Formula::Exists { var: qvar, bind, range, body }
            if qvar == var =>
        {
            // `var` goes out of scope at this quantifier; nothing below
            // this point refers to the outer binding.
            let rebuilt_range = substitute_range(range, var, tree);
            let rebuilt = (qvar.clone(), bind.clone(), rebuilt_range, body.clone());
            rebuild_quantifier(formula, rebuilt)
        }
        Formula::Forall { var: qvar, bind, range, body } => {
            let (qvar, body) = avoid_capture(ctx, qvar, body, var);
            let rebuilt_range = substitute_range(range, var, tree);
            let new_body = substitute(ctx, &body, var, tree);
            Formula::Forall {
                var: qvar,
                bind: bind.clone(),
                range: rebuilt_range,
                body: Box::new(new_body),
            }
        }
        Formula::Exists { var: qvar, bind, range, body } => {
            let (qvar, body) = avoid_capture(ctx, qvar, body, var);
            let rebuilt_range = substitute_range(range, var, tree);
            let new_body = substitute(ctx, &body, var, tree);
            Formula::Exists {
                var: qvar,
                bind: bind.clone(),
                range: rebuilt_range,
                body: Box::new(new_body),
            }
        }
    }
}

fn substitute_range(range: &RangeExpr, var: &Variable, tree: &DerivationTree) -> RangeExpr {
    match range {
        RangeExpr::Var(v) if v == var => RangeExpr::Tree(tree.clone()),
        RangeExpr::Var(_) | RangeExpr::Tree(_) => range.clone(),
    }
}

fn rebuild_quantifier(
    original: &Formula,
    (var, bind, range, body): (Variable, Option<crate::variable::BindExpression>, RangeExpr, Box<Formula>),
) -> Formula {
    match original {
        Formula::Forall { .. } => Formula::Forall { var, bind, range, body },
        Formula::Exists { .. } => Formula::Exists { var, bind, range, body },
        _ => unreachable!("rebuild_quantifier called on a non-quantifier"),
    }
}

fn avoid_capture(
    ctx: &mut Context,
    qvar: &Variable,
    body: &Formula,
    outer_var: &Variable,
) -> (Variable, Formula) {
    if qvar.name() != outer_var.name() {
        return (qvar.clone(), body.clone());
    }
    let fresh_name = ctx.fresh_dummy_name();
    let renamed_var = Variable::bound(fresh_name, qvar.nonterminal());
    let renamed_body = rename_bound(body, qvar, &renamed_var);
    (renamed_var, renamed_body)
}

fn rename_bound(formula: &Formula, from: &Variable, to: &Variable) -> Formula {
    match formula {
        Formula::True | Formula::False => formula.clone(),
        Formula::Smt(atom) => Formula::Smt(SmtAtom {
            op: atom.op.clone(),
            args: atom.args.iter().map(|t| rename_term(t, from, to)).collect(),
        }),
        Formula::StructuralPredicate { name, args } => Formula::StructuralPredicate {
            name: name.clone(),
            args: args.iter().map(|a| rename_arg(a, from, to)).collect(),
        },
        Formula::SemanticPredicate { name, args, binds_tree } => Formula::SemanticPredicate {
            name: name.clone(),
            args: args.iter().map(|a| rename_arg(a, from, to)).collect(),
            binds_tree: *binds_tree,
        },
        Formula::And(parts) => Formula::And(parts.iter().map(|p| rename_bound(p, from, to)).collect()),
        Formula::Or(parts) => Formula::Or(parts.iter().map(|p| rename_bound(p, from, to)).collect()),
        Formula::Not(inner) => Formula::not(rename_bound(inner, from, to)),
        Formula::Forall { var, bind, range, body } if var == from => {
            Formula::Forall { var: var.clone(), bind: bind.clone(), range: range.clone(), body: body.clone() }
        }
        Formula::Exists { var, bind, range, body } if var == from => {
            Formula::Exists { var: var.clone(), bind: bind.clone(), range: range.clone(), body: body.clone() }
        }
        Formula::Forall { var, bind, range, body } => Formula::Forall {
            var: var.clone(),
            bind: bind.clone(),
            range: range_rename(range, from, to),
            body: Box::new(rename_bound(body, from, to)),
        },
        Formula::Exists { var, bind, range, body } => Formula::Exists {
            var: var.clone(),
            bind: bind.clone(),
            range: range_rename(range, from, to),
            body: Box::new(rename_bound(body, from, to)),
        },
    }
}

fn range_rename(range: &RangeExpr, from: &Variable, to: &Variable) -> RangeExpr {
    match range {
        RangeExpr::Var(v) if v == from => RangeExpr::Var(to.clone()),
        RangeExpr::Var(_) | RangeExpr::Tree(_) => range.clone(),
    }
}

fn rename_term(term: &SmtTerm, from: &Variable, to: &Variable) -> SmtTerm {
    match term {
        SmtTerm::Var(v) if v == from => SmtTerm::Var(to.clone()),
        SmtTerm::App(op, args) => {
            SmtTerm::App(op.clone(), args.iter().map(|a| rename_term(a, from, to)).collect())
        }
        other => other.clone(),
    }
}

fn rename_arg(arg: &PredicateArg, from: &Variable, to: &Variable) -> PredicateArg {
    match arg {
        PredicateArg::Var(v) if v == from => PredicateArg::Var(to.clone()),
        other => other.clone(),
    }
}

/// Push negation down to atoms (De Morgan), eliminating `Not` wrapping a
/// connective or quantifier. Quantifiers dualize: `not(forall) = exists
/// (not body)`, `not(exists) = forall (not body)`.
pub fn to_nnf(formula: &Formula) -> Formula {
    match formula {
        Formula::Not(inner) => negate(inner),
        Formula::And(parts) => Formula::And(parts.iter().map(to_nnf).collect()),
        Formula::Or(parts) => Formula::Or(parts.iter().map(to_nnf).collect()),
        Formula::Forall { var, bind, range, body } => Formula::Forall {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(to_nnf(body)),
        },
        Formula::Exists { var, bind, range, body } => Formula::Exists {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(to_nnf(body)),
        },
        other => other.clone(),
    }
}

fn negate(formula: &Formula) -> Formula {
    match formula {
        Formula::True => Formula::False,
        Formula::False => Formula::True,
        Formula::Not(inner) => to_nnf(inner),
        Formula::And(parts) => Formula::Or(parts.iter().map(negate).collect()),
        Formula::Or(parts) => Formula::And(parts.iter().map(negate).collect()),
        Formula::Forall { var, bind, range, body } => Formula::Exists {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(negate(body)),
        },
        Formula::Exists { var, bind, range, body } => Formula::Forall {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(negate(body)),
        },
        atom => Formula::Not(Box::new(atom.clone())),
    }
}

/// Distribute `And` over `Or` to reach disjunctive normal form. Assumes the
/// input is already in NNF (no top-level `Not` of a connective).
pub fn to_dnf(formula: &Formula) -> Formula {
    match formula {
        Formula::And(parts) => {
            let disjuncts: Vec<Formula> = parts.iter().map(to_dnf).collect();
            disjuncts.into_iter().fold(Formula::True, |acc, next| distribute(&acc, &next))
        }
        Formula::Or(parts) => Formula::or(parts.iter().map(to_dnf).collect()),
        Formula::Forall { var, bind, range, body } => Formula::Forall {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(to_dnf(body)),
        },
        Formula::Exists { var, bind, range, body } => Formula::Exists {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(to_dnf(body)),
        },
        other => other.clone(),
    }
}

fn distribute(a: &Formula, b: &Formula) -> Formula {
    let a_disjuncts = disjuncts_of(a);
    let b_disjuncts = disjuncts_of(b);
    let mut out = Vec::with_capacity(a_disjuncts.len() * b_disjuncts.len());
    for da in &a_disjuncts {
        for db in &b_disjuncts {
            out.push(Formula::and(vec![da.clone(), db.clone()]));
        }
    }
    Formula::or(out)
}

fn disjuncts_of(formula: &Formula) -> Vec<Formula> {
    match formula {
        Formula::Or(parts) => parts.clone(),
        other => vec![other.clone()],
    }
}

/// Replace a quantifier whose bound variable does not occur free in its
/// body by `true` (spec.md §4.2: both `forall` and `exists` over a
/// vacuous body are trivially satisfiable, since the grammar always
/// derives at least one witness of the range's nonterminal).
pub fn eliminate_dead_quantifiers(formula: &Formula) -> Formula {
    match formula {
        Formula::Forall { var, body, .. } | Formula::Exists { var, body, .. } if !body.mentions_free(var) => {
            Formula::True
        }
        Formula::Forall { var, bind, range, body } => Formula::Forall {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(eliminate_dead_quantifiers(body)),
        },
        Formula::Exists { var, bind, range, body } => Formula::Exists {
            var: var.clone(),
            bind: bind.clone(),
            range: range.clone(),
            body: Box::new(eliminate_dead_quantifiers(body)),
        },
        Formula::And(parts) => Formula::and(parts.iter().map(eliminate_dead_quantifiers).collect()),
        Formula::Or(parts) => Formula::or(parts.iter().map(eliminate_dead_quantifiers).collect()),
        Formula::Not(inner) => Formula::not(eliminate_dead_quantifiers(inner)),
        other => other.clone(),
    }
}

/// Check admission well-formedness (spec.md §4.2): every bound variable is
/// introduced before use, every quantifier's range is the goal constant or
/// a variable bound by an enclosing quantifier, no SMT atom constrains the
/// goal constant alone, and no quantifier rebinds an in-scope name.
pub fn well_formed(formula: &Formula) -> Result<(), SolverError> {
    let mut scope = HashSet::new();
    scope.insert(Variable::goal());
    check_scope(formula, &scope)
}

fn check_scope(formula: &Formula, scope: &HashSet<Variable>) -> Result<(), SolverError> {
    match formula {
        Formula::True | Formula::False => Ok(()),
        Formula::Smt(atom) => {
            let free = atom.free_variables();
            if free.len() == 1 && free.contains(&Variable::goal()) {
                return Err(SolverError::Specification(
                    "an SMT atom may not constrain the goal constant alone".to_string(),
                ));
            }
            for v in &free {
                if v.is_constant() && !scope.contains(v) {
                    return Err(SolverError::Specification(format!(
                        "constant '{}' used before being introduced",
                        v.name()
                    )));
                }
            }
            Ok(())
        }
        Formula::StructuralPredicate { args, .. } | Formula::SemanticPredicate { args, .. } => {
            for arg in args {
                if let PredicateArg::Var(v) = arg {
                    if !scope.contains(v) && !matches!(v, crate::variable::Variable::Dummy { .. }) {
                        return Err(SolverError::Specification(format!(
                            "variable '{}' used before being bound",
                            v.name()
                        )));
                    }
                }
            }
            Ok(())
        }
        Formula::And(parts) | Formula::Or(parts) => {
            for part in parts {
                check_scope(part, scope)?;
            }
            Ok(())
        }
        Formula::Not(inner) => check_scope(inner, scope),
        Formula::Forall { var, range, body, .. } | Formula::Exists { var, range, body, .. } => {
            if let Some(range_var) = range.variable() {
                if !scope.contains(range_var) {
                    return Err(SolverError::Specification(format!(
                        "quantifier range '{}' is not the goal constant nor an enclosing bound variable",
                        range_var.name()
                    )));
                }
            }
            if scope.contains(var) {
                return Err(SolverError::Specification(format!(
                    "quantifier rebinds '{}', which is already in scope",
                    var.name()
                )));
            }
            let mut inner_scope = scope.clone();
            inner_scope.insert(var.clone());
            check_scope(body, &inner_scope)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::Variable;

    #[test]
    fn nnf_pushes_negation_through_and() {
        let a = Formula::Smt(SmtAtom::new("a", vec![]));
        let b = Formula::Smt(SmtAtom::new("b", vec![]));
        let formula = Formula::Not(Box::new(Formula::And(vec![a.clone(), b.clone()])));
        let nnf = to_nnf(&formula);
        assert_eq!(nnf, Formula::Or(vec![Formula::Not(Box::new(a)), Formula::Not(Box::new(b))]));
    }

    #[test]
    fn nnf_dualizes_quantifiers() {
        let var = Variable::bound("x", "<a>");
        let body = Formula::Smt(SmtAtom::new("p", vec![SmtTerm::Var(var.clone())]));
        let formula = Formula::Not(Box::new(Formula::Forall {
            var: var.clone(),
            bind: None,
            range: RangeExpr::Var(Variable::goal()),
            body: Box::new(body.clone()),
        }));
        let nnf = to_nnf(&formula);
        match nnf {
            Formula::Exists { body: inner, .. } => assert_eq!(*inner, Formula::Not(Box::new(body))),
            other => panic!("expected Exists, got {other:?}"),
        }
    }

    #[test]
    fn dnf_distributes_and_over_or() {
        let a = Formula::Smt(SmtAtom::new("a", vec![]));
        let b = Formula::Smt(SmtAtom::new("b", vec![]));
        let c = Formula::Smt(SmtAtom::new("c", vec![]));
        let formula = Formula::And(vec![a.clone(), Formula::Or(vec![b.clone(), c.clone()])]);
        let dnf = to_dnf(&formula);
        assert_eq!(
            dnf,
            Formula::Or(vec![
                Formula::And(vec![a.clone(), b]),
                Formula::And(vec![a, c]),
            ])
        );
    }

    #[test]
    fn dead_quantifier_becomes_true() {
        let var = Variable::bound("x", "<a>");
        let formula = Formula::Forall {
            var,
            bind: None,
            range: RangeExpr::Var(Variable::goal()),
            body: Box::new(Formula::True),
        };
        assert_eq!(eliminate_dead_quantifiers(&formula), Formula::True);
    }

    #[test]
    fn well_formed_rejects_goal_only_smt_atom() {
        let atom = Formula::Smt(SmtAtom::new("=", vec![SmtTerm::Var(Variable::goal())]));
        assert!(well_formed(&atom).is_err());
    }

    #[test]
    fn well_formed_rejects_rebinding() {
        let var = Variable::bound("x", "<a>");
        let inner = Formula::Forall {
            var: var.clone(),
            bind: None,
            range: RangeExpr::Var(var.clone()),
            body: Box::new(Formula::True),
        };
        let formula = Formula::Forall {
            var: var.clone(),
            bind: None,
            range: RangeExpr::Var(Variable::goal()),
            body: Box::new(inner),
        };
        assert!(well_formed(&formula).is_err());
    }

    #[test]
    fn well_formed_accepts_nested_scoping() {
        let outer = Variable::bound("x", "<a>");
        let inner = Variable::bound("y", "<b>");
        let body = Formula::Smt(SmtAtom::new("=", vec![SmtTerm::Var(inner.clone())]));
        let formula = Formula::Forall {
            var: outer.clone(),
            bind: None,
            range: RangeExpr::Var(Variable::goal()),
            body: Box::new(Formula::Forall {
                var: inner,
                bind: None,
                range: RangeExpr::Var(outer),
                body: Box::new(body),
            }),
        };
        assert!(well_formed(&formula).is_ok());
    }

    #[test]
    fn substitute_replaces_predicate_argument() {
        let mut ctx = Context::new();
        let var = Variable::bound("x", "<a>");
        let formula = Formula::StructuralPredicate {
            name: "before".to_string(),
            args: vec![PredicateArg::Var(var.clone())],
        };
        let tree = DerivationTree::terminal(&mut ctx, "a");
        let substituted = substitute(&mut ctx, &formula, &var, &tree);
        match substituted {
            Formula::StructuralPredicate { args, .. } => {
                assert_eq!(args[0], PredicateArg::Tree(tree));
            }
            other => panic!("expected StructuralPredicate, got {other:?}"),
        }
    }
}
