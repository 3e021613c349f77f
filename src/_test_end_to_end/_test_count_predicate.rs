//! Scenario 4 (spec.md §8): `count(G, tree, "<assgn>", "3")` on
//! `x := 1 ; x := 1 ; x := 1` returns true; with `"4"` returns false; on
//! an open `<stmt>` with target 4 it returns a substitution expanding
//! `<stmt>` into four assignments.

use std::collections::HashMap;

use crate::context::Context;
use crate::formula::PredicateArg;
use crate::grammar::{Grammar, Symbol, START_SYMBOL};
use crate::predicates::{eval_count, SemPredResult};
use crate::tree::DerivationTree;
use crate::variable::{Variable, NUM_TYPE};

fn assignment_language_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<stmt>")]);
    g.add_production(
        "<stmt>",
        vec![Symbol::nonterminal("<assgn>"), Symbol::terminal(" ; "), Symbol::nonterminal("<stmt>")],
    );
    g.add_production("<stmt>", vec![Symbol::nonterminal("<assgn>")]);
    g.add_production(
        "<assgn>",
        vec![Symbol::nonterminal("<var>"), Symbol::terminal(" := "), Symbol::nonterminal("<rhs>")],
    );
    g.add_production("<rhs>", vec![Symbol::nonterminal("<var>")]);
    g.add_production("<rhs>", vec![Symbol::nonterminal("<digit>")]);
    for name in ["x", "y"] {
        g.add_production("<var>", vec![Symbol::terminal(name)]);
    }
    for d in "01".chars() {
        g.add_production("<digit>", vec![Symbol::terminal(d.to_string())]);
    }
    g
}

#[test]
fn count_of_three_assignments_matches_target_three() {
    let mut ctx = Context::new();
    let grammar = assignment_language_grammar();
    let tree = crate::parser::parse(&grammar, &mut ctx, "<stmt>", "x := 1 ; x := 1 ; x := 1")
        .expect("three semicolon-separated assignments must parse");
    assert!(tree.is_closed());

    let n_var = Variable::constant("n", NUM_TYPE);
    let target = DerivationTree::from_terminal_production(&mut ctx, NUM_TYPE, "3");
    let result = eval_count(
        &mut ctx,
        &grammar,
        &tree,
        &Variable::goal(),
        "<assgn>",
        &PredicateArg::Tree(target),
        &n_var,
        &HashMap::new(),
    );
    assert!(matches!(result, SemPredResult::True));
}

#[test]
fn count_of_three_assignments_does_not_match_target_four() {
    let mut ctx = Context::new();
    let grammar = assignment_language_grammar();
    let tree = crate::parser::parse(&grammar, &mut ctx, "<stmt>", "x := 1 ; x := 1 ; x := 1")
        .expect("three semicolon-separated assignments must parse");

    let n_var = Variable::constant("n", NUM_TYPE);
    let target = DerivationTree::from_terminal_production(&mut ctx, NUM_TYPE, "4");
    let result = eval_count(
        &mut ctx,
        &grammar,
        &tree,
        &Variable::goal(),
        "<assgn>",
        &PredicateArg::Tree(target),
        &n_var,
        &HashMap::new(),
    );
    assert!(matches!(result, SemPredResult::False));
}

#[test]
fn open_stmt_with_target_four_proposes_four_assignments() {
    let mut ctx = Context::new();
    let grammar = assignment_language_grammar();
    let open_stmt = DerivationTree::open(&mut ctx, "<stmt>");

    let n_var = Variable::constant("n", NUM_TYPE);
    let target = DerivationTree::from_terminal_production(&mut ctx, NUM_TYPE, "4");
    let result = eval_count(
        &mut ctx,
        &grammar,
        &open_stmt,
        &Variable::goal(),
        "<assgn>",
        &PredicateArg::Tree(target),
        &n_var,
        &HashMap::new(),
    );
    match result {
        SemPredResult::Substitute(map) => {
            let grown = map.get(&Variable::goal()).expect("substitution targets the tree argument");
            assert_eq!(
                count_assgn_occurrences(grown),
                4,
                "expected exactly four <assgn> occurrences, tree was `{grown:?}`"
            );
        }
        other => panic!("expected Substitute, got {other:?}"),
    }
}

fn count_assgn_occurrences(tree: &DerivationTree) -> usize {
    let mut total = if tree.symbol() == "<assgn>" { 1 } else { 0 };
    for child in tree.children() {
        total += count_assgn_occurrences(child);
    }
    total
}
