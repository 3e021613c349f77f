//! The formula model (spec.md §3 "Formula (F)", §4.2).

use std::collections::BTreeSet;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::tree::DerivationTree;
use crate::variable::{BindElement, BindExpression, Variable};

/// An SMT term: a string-typed expression built from free constants and
/// string/numeric literals (spec.md §4.6).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SmtTerm {
    Var(Variable),
    /// A constant that has been substituted by a concrete tree (spec.md
    /// §4.2 capture-free substitution). Ground (usable by the SMT backend)
    /// only once the tree is closed; its value is then the tree's string
    /// image.
    Tree(DerivationTree),
    StringLiteral(String),
    IntLiteral(i64),
    /// An uninterpreted application, e.g. `(str.len x)` or `(+ x y)`.
    App(String, Vec<SmtTerm>),
}

impl SmtTerm {
    pub fn free_variables(&self, out: &mut BTreeSet<Variable>) {
        match self {
            SmtTerm::Var(v) => {
                out.insert(v.clone());
            }
            SmtTerm::Tree(_) | SmtTerm::StringLiteral(_) | SmtTerm::IntLiteral(_) => {}
            SmtTerm::App(_, args) => {
                for arg in args {
                    arg.free_variables(out);
                }
            }
        }
    }

    /// This term's string image, if it is already ground (a literal, or a
    /// substituted tree with no remaining open leaves).
    pub fn ground_value(&self) -> Option<String> {
        match self {
            SmtTerm::StringLiteral(s) => Some(s.clone()),
            SmtTerm::IntLiteral(n) => Some(n.to_string()),
            SmtTerm::Tree(t) if t.is_closed() => Some(t.to_source_string()),
            _ => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        match self {
            SmtTerm::Var(_) => false,
            SmtTerm::Tree(t) => t.is_closed(),
            SmtTerm::StringLiteral(_) | SmtTerm::IntLiteral(_) => true,
            SmtTerm::App(_, args) => args.iter().all(SmtTerm::is_ground),
        }
    }

    fn hash_structural<H: Hasher>(&self, hasher: &mut H) {
        match self {
            SmtTerm::Var(v) => {
                0u8.hash(hasher);
                v.hash(hasher);
            }
            SmtTerm::Tree(t) => {
                1u8.hash(hasher);
                t.structural_hash().hash(hasher);
            }
            SmtTerm::StringLiteral(s) => {
                2u8.hash(hasher);
                s.hash(hasher);
            }
            SmtTerm::IntLiteral(n) => {
                3u8.hash(hasher);
                n.hash(hasher);
            }
            SmtTerm::App(op, args) => {
                4u8.hash(hasher);
                op.hash(hasher);
                args.len().hash(hasher);
                for arg in args {
                    arg.hash_structural(hasher);
                }
            }
        }
    }
}

/// A boolean SMT atom (spec.md §4.6): an application of a boolean-valued
/// operator (`=`, `str.contains`, ...) to SMT terms.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SmtAtom {
    pub op: String,
    pub args: Vec<SmtTerm>,
}

impl SmtAtom {
    pub fn new(op: impl Into<String>, args: Vec<SmtTerm>) -> Self {
        SmtAtom { op: op.into(), args }
    }

    pub fn free_variables(&self) -> BTreeSet<Variable> {
        let mut out = BTreeSet::new();
        for term in &self.args {
            term.free_variables(&mut out);
        }
        out
    }

    /// True once every argument term is ground (spec.md §4.7 rule 1: SMT
    /// conjuncts are only sent to the backend once all their free
    /// constants are bound to concrete trees or literals).
    pub fn is_ground(&self) -> bool {
        self.args.iter().all(SmtTerm::is_ground)
    }

    fn hash_structural<H: Hasher>(&self, hasher: &mut H) {
        self.op.hash(hasher);
        self.args.len().hash(hasher);
        for arg in &self.args {
            arg.hash_structural(hasher);
        }
    }
}

impl fmt::Display for SmtAtom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}", self.op)?;
        for arg in &self.args {
            write!(f, " {arg:?}")?;
        }
        write!(f, ")")
    }
}

/// An argument to a structural or semantic predicate: a variable (resolved
/// against the current binding), a tree already bound at formula-
/// construction time, or a literal (e.g. the "kind" argument of `level`,
/// spec.md §4.4) that never resolves to a path (spec.md §4.4/§4.5).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PredicateArg {
    Var(Variable),
    Tree(DerivationTree),
    Literal(String),
}

impl PredicateArg {
    pub fn free_variables(&self, out: &mut BTreeSet<Variable>) {
        if let PredicateArg::Var(v) = self {
            out.insert(v.clone());
        }
    }

    fn hash_structural<H: Hasher>(&self, hasher: &mut H) {
        match self {
            PredicateArg::Var(v) => {
                0u8.hash(hasher);
                v.hash(hasher);
            }
            PredicateArg::Tree(t) => {
                1u8.hash(hasher);
                t.structural_hash().hash(hasher);
            }
            PredicateArg::Literal(s) => {
                2u8.hash(hasher);
                s.hash(hasher);
            }
        }
    }
}

/// The range a quantifier ranges over: the goal tree, a variable bound by
/// an enclosing quantifier (spec.md §4.2 well-formedness), or a concrete
/// tree once that enclosing binding has been eliminated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RangeExpr {
    Var(Variable),
    Tree(DerivationTree),
}

impl RangeExpr {
    /// The variable this range refers to, if it hasn't been grounded yet.
    pub fn variable(&self) -> Option<&Variable> {
        match self {
            RangeExpr::Var(v) => Some(v),
            RangeExpr::Tree(_) => None,
        }
    }

    /// The concrete tree this range denotes, once known: the grounded
    /// range itself, or the ambient goal tree when the range is the goal
    /// constant.
    pub fn resolve<'a>(&'a self, goal: &'a DerivationTree) -> Option<&'a DerivationTree> {
        match self {
            RangeExpr::Tree(t) => Some(t),
            RangeExpr::Var(v) if *v == Variable::goal() => Some(goal),
            RangeExpr::Var(_) => None,
        }
    }

    fn hash_structural<H: Hasher>(&self, hasher: &mut H) {
        match self {
            RangeExpr::Var(v) => {
                0u8.hash(hasher);
                v.hash(hasher);
            }
            RangeExpr::Tree(t) => {
                1u8.hash(hasher);
                t.structural_hash().hash(hasher);
            }
        }
    }
}

fn hash_bind_structural<H: Hasher>(bind: &BindExpression, hasher: &mut H) {
    bind.elements().len().hash(hasher);
    for element in bind.elements() {
        match element {
            BindElement::Var(v) => {
                0u8.hash(hasher);
                v.hash(hasher);
            }
            BindElement::Literal(s) => {
                1u8.hash(hasher);
                s.hash(hasher);
            }
        }
    }
}

/// A first-order specification formula (spec.md §3 "Formula (F)").
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Formula {
    True,
    False,
    Smt(SmtAtom),
    StructuralPredicate { name: String, args: Vec<PredicateArg> },
    SemanticPredicate { name: String, args: Vec<PredicateArg>, binds_tree: bool },
    Forall { var: Variable, bind: Option<BindExpression>, range: RangeExpr, body: Box<Formula> },
    Exists { var: Variable, bind: Option<BindExpression>, range: RangeExpr, body: Box<Formula> },
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Not(Box<Formula>),
}

impl Formula {
    pub fn and(parts: Vec<Formula>) -> Formula {
        let parts: Vec<Formula> = parts.into_iter().filter(|f| *f != Formula::True).collect();
        if parts.iter().any(|f| *f == Formula::False) {
            Formula::False
        } else if parts.is_empty() {
            Formula::True
        } else if parts.len() == 1 {
            parts.into_iter().next().unwrap()
        } else {
            Formula::And(parts)
        }
    }

    pub fn or(parts: Vec<Formula>) -> Formula {
        let parts: Vec<Formula> = parts.into_iter().filter(|f| *f != Formula::False).collect();
        if parts.iter().any(|f| *f == Formula::True) {
            Formula::True
        } else if parts.is_empty() {
            Formula::False
        } else if parts.len() == 1 {
            parts.into_iter().next().unwrap()
        } else {
            Formula::Or(parts)
        }
    }

    pub fn not(inner: Formula) -> Formula {
        match inner {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            other => Formula::Not(Box::new(other)),
        }
    }

    /// Free constants of this formula: every [`Variable::Constant`]
    /// mentioned, directly or inside a nested quantifier's body (bound
    /// variables are excluded once they enter scope).
    pub fn free_variables(&self) -> BTreeSet<Variable> {
        let mut out = BTreeSet::new();
        self.collect_free_variables(&mut out);
        out
    }

    fn collect_free_variables(&self, out: &mut BTreeSet<Variable>) {
        match self {
            Formula::True | Formula::False => {}
            Formula::Smt(atom) => out.extend(atom.free_variables()),
            Formula::StructuralPredicate { args, .. } | Formula::SemanticPredicate { args, .. } => {
                for arg in args {
                    arg.free_variables(out);
                }
            }
            Formula::Forall { var, bind, range, body } | Formula::Exists { var, bind, range, body } => {
                if let Some(range_var) = range.variable() {
                    out.insert(range_var.clone());
                }
                if let Some(bind) = bind {
                    for extra in bind.all_variables() {
                        if extra != var {
                            out.insert(extra.clone());
                        }
                    }
                }
                let mut inner = BTreeSet::new();
                body.collect_free_variables(&mut inner);
                inner.remove(var);
                out.extend(inner);
            }
            Formula::And(parts) | Formula::Or(parts) => {
                for part in parts {
                    part.collect_free_variables(out);
                }
            }
            Formula::Not(inner) => inner.collect_free_variables(out),
        }
    }

    /// Does `var` occur free in this formula? Used for dead-quantifier
    /// detection (spec.md §4.2).
    pub fn mentions_free(&self, var: &Variable) -> bool {
        self.free_variables().contains(var)
    }

    pub fn is_literal_atom(&self) -> bool {
        matches!(
            self,
            Formula::True
                | Formula::False
                | Formula::Smt(_)
                | Formula::StructuralPredicate { .. }
                | Formula::SemanticPredicate { .. }
        )
    }

    /// A content hash used by the scheduler's `(tree, formula)` dedup key
    /// (spec.md §4.9 "Deduplication"): hashes the formula's shape and
    /// embedded values, not its identity.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_structural(&mut hasher);
        hasher.finish()
    }

    fn hash_structural<H: Hasher>(&self, hasher: &mut H) {
        match self {
            Formula::True => 0u8.hash(hasher),
            Formula::False => 1u8.hash(hasher),
            Formula::Smt(atom) => {
                2u8.hash(hasher);
                atom.hash_structural(hasher);
            }
            Formula::StructuralPredicate { name, args } => {
                3u8.hash(hasher);
                name.hash(hasher);
                args.len().hash(hasher);
                for arg in args {
                    arg.hash_structural(hasher);
                }
            }
            Formula::SemanticPredicate { name, args, binds_tree } => {
                4u8.hash(hasher);
                name.hash(hasher);
                binds_tree.hash(hasher);
                args.len().hash(hasher);
                for arg in args {
                    arg.hash_structural(hasher);
                }
            }
            Formula::Forall { var, bind, range, body } => {
                5u8.hash(hasher);
                var.hash(hasher);
                match bind {
                    Some(b) => {
                        true.hash(hasher);
                        hash_bind_structural(b, hasher);
                    }
                    None => false.hash(hasher),
                }
                range.hash_structural(hasher);
                body.hash_structural(hasher);
            }
            Formula::Exists { var, bind, range, body } => {
                6u8.hash(hasher);
                var.hash(hasher);
                match bind {
                    Some(b) => {
                        true.hash(hasher);
                        hash_bind_structural(b, hasher);
                    }
                    None => false.hash(hasher),
                }
                range.hash_structural(hasher);
                body.hash_structural(hasher);
            }
            Formula::And(parts) => {
                7u8.hash(hasher);
                parts.len().hash(hasher);
                for part in parts {
                    part.hash_structural(hasher);
                }
            }
            Formula::Or(parts) => {
                8u8.hash(hasher);
                parts.len().hash(hasher);
                for part in parts {
                    part.hash_structural(hasher);
                }
            }
            Formula::Not(inner) => {
                9u8.hash(hasher);
                inner.hash_structural(hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_of_true_collapses() {
        assert_eq!(Formula::and(vec![Formula::True, Formula::True]), Formula::True);
    }

    #[test]
    fn and_with_false_short_circuits() {
        let atom = Formula::Smt(SmtAtom::new("=", vec![]));
        assert_eq!(Formula::and(vec![atom, Formula::False]), Formula::False);
    }

    #[test]
    fn not_not_is_not_double_negated_automatically() {
        let atom = Formula::Smt(SmtAtom::new("=", vec![]));
        let negated = Formula::not(atom.clone());
        assert_eq!(negated, Formula::Not(Box::new(atom)));
    }

    #[test]
    fn structural_hash_matches_for_equal_formulas_and_differs_for_distinct_ones() {
        let atom = Formula::Smt(SmtAtom::new("=", vec![SmtTerm::StringLiteral("y".to_string())]));
        let same = Formula::Smt(SmtAtom::new("=", vec![SmtTerm::StringLiteral("y".to_string())]));
        let different = Formula::Smt(SmtAtom::new("=", vec![SmtTerm::StringLiteral("z".to_string())]));
        assert_eq!(atom.structural_hash(), same.structural_hash());
        assert_ne!(atom.structural_hash(), different.structural_hash());
    }

    #[test]
    fn free_variables_excludes_bound_name() {
        let v = Variable::bound("x", "<var>");
        let body = Formula::StructuralPredicate {
            name: "before".to_string(),
            args: vec![PredicateArg::Var(v.clone())],
        };
        let formula = Formula::Forall {
            var: v.clone(),
            bind: None,
            range: RangeExpr::Var(Variable::goal()),
            body: Box::new(body),
        };
        assert!(!formula.free_variables().contains(&v));
        assert!(formula.free_variables().contains(&Variable::goal()));
    }
}
