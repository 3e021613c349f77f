//! Variables and bind expressions (spec.md §3 "Variable" / "Bind
//! expression").

use std::fmt;

use crate::context::Context;

/// The distinguished type used for numeric constants (e.g. the `n` argument
/// of `count`); not a grammar nonterminal.
pub const NUM_TYPE: &str = "NUM";

/// The name of the constant that is always bound to a solution state's root
/// tree (spec.md §3 "Solution state").
pub const GOAL_CONSTANT: &str = "start";

/// A variable occurring in a formula: a free constant, a bound variable
/// introduced by a quantifier, or an anonymous dummy inside a bind
/// expression.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Variable {
    /// A free, globally named constant of a nonterminal type (or `NUM`).
    Constant { name: String, nonterminal: String },
    /// A name bound by an enclosing quantifier.
    Bound { name: String, nonterminal: String },
    /// An anonymous placeholder inside a bind expression, standing for a
    /// part of the shape whose path is not named.
    Dummy { name: String, nonterminal: String },
}

impl Variable {
    pub fn constant(name: impl Into<String>, nonterminal: impl Into<String>) -> Self {
        Variable::Constant { name: name.into(), nonterminal: nonterminal.into() }
    }

    pub fn bound(name: impl Into<String>, nonterminal: impl Into<String>) -> Self {
        Variable::Bound { name: name.into(), nonterminal: nonterminal.into() }
    }

    pub fn dummy(ctx: &mut Context, nonterminal: impl Into<String>) -> Self {
        Variable::Dummy { name: ctx.fresh_dummy_name(), nonterminal: nonterminal.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Variable::Constant { name, .. } | Variable::Bound { name, .. } | Variable::Dummy { name, .. } => name,
        }
    }

    pub fn nonterminal(&self) -> &str {
        match self {
            Variable::Constant { nonterminal, .. }
            | Variable::Bound { nonterminal, .. }
            | Variable::Dummy { nonterminal, .. } => nonterminal,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Variable::Constant { .. })
    }

    pub fn is_numeric(&self) -> bool {
        self.nonterminal() == NUM_TYPE
    }

    /// The goal constant, always bound to a solution state's root tree.
    pub fn goal() -> Self {
        Variable::constant(GOAL_CONSTANT, crate::grammar::START_SYMBOL)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One element of a bind expression: either a named/dummy variable taking
/// up one subtree position, or a literal fragment of text that must appear
/// verbatim between variable positions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BindElement {
    Var(Variable),
    Literal(String),
}

/// A concatenation of bound variables and literal fragments describing the
/// required shape of a matched subtree, and naming parts of it by path
/// (spec.md §3 "Bind expression", §4.3 "Match engine").
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BindExpression {
    elements: Vec<BindElement>,
}

impl BindExpression {
    pub fn new(elements: Vec<BindElement>) -> Self {
        BindExpression { elements }
    }

    pub fn elements(&self) -> &[BindElement] {
        &self.elements
    }

    /// Named (non-dummy) variables introduced by this bind expression, in
    /// left-to-right order.
    pub fn named_variables(&self) -> Vec<&Variable> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                BindElement::Var(v) if !matches!(v, Variable::Dummy { .. }) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// All variables, including dummies, in left-to-right order.
    pub fn all_variables(&self) -> Vec<&Variable> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                BindElement::Var(v) => Some(v),
                BindElement::Literal(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_constant_has_fixed_name() {
        assert_eq!(Variable::goal().name(), GOAL_CONSTANT);
    }

    #[test]
    fn numeric_variable_is_recognized() {
        let v = Variable::constant("n", NUM_TYPE);
        assert!(v.is_numeric());
    }

    #[test]
    fn bind_expression_separates_dummies_from_named() {
        let mut ctx = Context::new();
        let named = Variable::bound("lhs", "<var>");
        let dummy = Variable::dummy(&mut ctx, "<var>");
        let expr = BindExpression::new(vec![
            BindElement::Var(named.clone()),
            BindElement::Literal(" := ".to_string()),
            BindElement::Var(dummy.clone()),
        ]);
        assert_eq!(expr.named_variables(), vec![&named]);
        assert_eq!(expr.all_variables(), vec![&named, &dummy]);
    }
}
