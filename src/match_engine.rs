//! The match engine (spec.md §4.3): bind-expression matching against a
//! concrete subtree, and the "may-match" reachability guard that keeps a
//! universal quantifier alive while an open leaf could still satisfy it.

use std::collections::HashMap;

use crate::grammar::Reachability;
use crate::tree::{DerivationTree, NodeValue, Path};
use crate::variable::{BindElement, BindExpression, Variable};

/// The path, relative to the matched subtree's root, bound to each named
/// variable of a bind expression.
pub type MatchBindings = HashMap<Variable, Path>;

/// Does `tree`'s own top-level production match `bind` element for
/// element? Each [`BindElement::Var`] must align with a child whose own
/// nonterminal equals the variable's declared type; each
/// [`BindElement::Literal`] must align with a terminal child whose text is
/// exactly that literal. Returns the path (relative to `tree`) of every
/// named variable on success.
pub fn match_at(tree: &DerivationTree, bind: &BindExpression) -> Option<MatchBindings> {
    let children = tree.children();
    let elements = bind.elements();
    if children.len() != elements.len() {
        return None;
    }
    let mut bindings = MatchBindings::new();
    for (index, (child, element)) in children.iter().zip(elements.iter()).enumerate() {
        match element {
            BindElement::Literal(text) => match child.value() {
                NodeValue::Terminal(actual) if actual == text => {}
                _ => return None,
            },
            BindElement::Var(var) => {
                if child.symbol() != var.nonterminal() {
                    return None;
                }
                if !matches!(var, Variable::Dummy { .. }) {
                    bindings.insert(var.clone(), Path::root().child(index));
                }
            }
        }
    }
    Some(bindings)
}

/// Enumerate every subtree of `tree` whose own symbol is `nonterminal` and
/// whose top-level shape matches `bind`, returning the absolute path to the
/// subtree's root together with the bindings found relative to it,
/// translated to absolute paths.
pub fn find_matches(tree: &DerivationTree, nonterminal: &str, bind: &BindExpression) -> Vec<(Path, MatchBindings)> {
    let mut out = Vec::new();
    collect_matches(tree, Path::root(), nonterminal, bind, &mut out);
    out
}

fn collect_matches(
    node: &DerivationTree,
    here: Path,
    nonterminal: &str,
    bind: &BindExpression,
    out: &mut Vec<(Path, MatchBindings)>,
) {
    if node.symbol() == nonterminal {
        if let Some(relative) = match_at(node, bind) {
            let absolute = relative
                .into_iter()
                .map(|(var, path)| (var, Path(here.0.iter().chain(path.0.iter()).copied().collect())))
                .collect();
            out.push((here.clone(), absolute));
        }
    }
    for (index, child) in node.children().iter().enumerate() {
        collect_matches(child, here.child(index), nonterminal, bind, out);
    }
}

/// May-match test (spec.md §4.3): can `leaf_nonterminal` still, through
/// zero or more expansion steps, produce a subtree whose own symbol is
/// `required_root`? Used to guard universal elimination: a `forall` must
/// not be dropped while an open leaf could still expand into something
/// matching its bind expression.
pub fn may_match(reachability: &Reachability, leaf_nonterminal: &str, required_root: &str) -> bool {
    reachability.reachable(leaf_nonterminal, required_root)
}

/// True iff no open leaf of `tree` may still match `required_root` via
/// `reachability` — the condition under which a universal quantifier may
/// finally be removed.
pub fn no_open_leaf_may_match(tree: &DerivationTree, reachability: &Reachability, required_root: &str) -> bool {
    tree.open_leaves().iter().all(|(_, leaf)| !may_match(reachability, leaf.symbol(), required_root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::grammar::{Grammar, Symbol, START_SYMBOL};
    use crate::tree::expand_leaf;

    fn assgn_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<assgn>")]);
        g.add_production(
            "<assgn>",
            vec![Symbol::nonterminal("<var>"), Symbol::terminal(" := "), Symbol::nonterminal("<rhs>")],
        );
        g.add_production("<rhs>", vec![Symbol::nonterminal("<var>")]);
        g.add_production("<var>", vec![Symbol::terminal("x")]);
        g.add_production("<var>", vec![Symbol::terminal("y")]);
        g
    }

    #[test]
    fn match_at_binds_named_variables_and_checks_literal() {
        let mut ctx = Context::new();
        let grammar = assgn_grammar();
        let root = DerivationTree::open(&mut ctx, "<assgn>");
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path::root(), 0).unwrap();

        let lhs = Variable::bound("lhs", "<var>");
        let rhs = Variable::bound("rhs", "<rhs>");
        let bind = BindExpression::new(vec![
            BindElement::Var(lhs.clone()),
            BindElement::Literal(" := ".to_string()),
            BindElement::Var(rhs.clone()),
        ]);

        let bindings = match_at(&root, &bind).unwrap();
        assert_eq!(bindings.get(&lhs), Some(&Path(vec![0])));
        assert_eq!(bindings.get(&rhs), Some(&Path(vec![2])));
    }

    #[test]
    fn match_at_rejects_wrong_literal() {
        let mut ctx = Context::new();
        let grammar = assgn_grammar();
        let root = DerivationTree::open(&mut ctx, "<assgn>");
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path::root(), 0).unwrap();
        let bind = BindExpression::new(vec![
            BindElement::Var(Variable::bound("lhs", "<var>")),
            BindElement::Literal(" = ".to_string()),
            BindElement::Var(Variable::bound("rhs", "<rhs>")),
        ]);
        assert!(match_at(&root, &bind).is_none());
    }

    #[test]
    fn find_matches_locates_nested_subtree() {
        let mut ctx = Context::new();
        let grammar = assgn_grammar();
        let root = DerivationTree::open(&mut ctx, START_SYMBOL);
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path::root(), 0).unwrap();
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path(vec![0]), 0).unwrap();
        let bind = BindExpression::new(vec![
            BindElement::Var(Variable::bound("lhs", "<var>")),
            BindElement::Literal(" := ".to_string()),
            BindElement::Var(Variable::bound("rhs", "<rhs>")),
        ]);
        let matches = find_matches(&root, "<assgn>", &bind);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, Path(vec![0]));
    }

    #[test]
    fn may_match_follows_grammar_reachability() {
        let grammar = assgn_grammar();
        let reach = grammar.reachability();
        assert!(may_match(&reach, START_SYMBOL, "<assgn>"));
        assert!(!may_match(&reach, "<var>", "<assgn>"));
    }
}
