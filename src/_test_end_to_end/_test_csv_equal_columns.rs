//! Scenario 2 (spec.md §8): a grammar of comma-separated-field records;
//! there exists an integer `colno ∈ [3,5]` such that the header and every
//! record contain exactly `colno` fields.

use crate::builders::{and, count, forall, int_lit, or, smt, var_term};
use crate::context::Context;
use crate::grammar::{Grammar, Symbol, START_SYMBOL};
use crate::smt::EnumeratingBackend;
use crate::solver::{self, SolverOptions};
use crate::variable::{Variable, NUM_TYPE};

/// `<table>` is a semicolon-separated sequence of `<record>`s, each a
/// comma-separated sequence of `<field>`s; the first record models the
/// header, every later one a data row, both drawn from the same
/// `<record>` nonterminal so `count`/`forall` treat them uniformly.
fn csv_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<table>")]);
    g.add_production("<table>", vec![Symbol::nonterminal("<record>")]);
    g.add_production(
        "<table>",
        vec![Symbol::nonterminal("<record>"), Symbol::terminal(";"), Symbol::nonterminal("<table>")],
    );
    g.add_production("<record>", vec![Symbol::nonterminal("<fields>")]);
    g.add_production("<fields>", vec![Symbol::nonterminal("<field>")]);
    g.add_production(
        "<fields>",
        vec![Symbol::nonterminal("<field>"), Symbol::terminal(","), Symbol::nonterminal("<fields>")],
    );
    for name in ["a", "b", "c"] {
        g.add_production("<field>", vec![Symbol::terminal(name)]);
    }
    g
}

/// `exists colno in {3,4,5}: forall <record> r in start: count(r, "<field>", colno)`.
fn equal_column_count_formula() -> crate::formula::Formula {
    let goal = Variable::goal();
    let colno = Variable::constant("colno", NUM_TYPE);
    let domain = or(vec![
        smt("=", vec![var_term(&colno), int_lit(3)]),
        smt("=", vec![var_term(&colno), int_lit(4)]),
        smt("=", vec![var_term(&colno), int_lit(5)]),
    ]);
    let record = Variable::bound("r", "<record>");
    let every_record_has_colno_fields = forall(record.clone(), &goal, count(&record, "<field>", &colno));
    crate::builders::and(vec![domain, every_record_has_colno_fields])
}

#[test]
fn every_row_shares_a_column_count_between_3_and_5() {
    let mut ctx = Context::new();
    let grammar = csv_grammar();
    let formula = equal_column_count_formula();
    let backend = EnumeratingBackend::default();
    let mut options = SolverOptions::uniform_weights();
    options.max_solutions = 4;

    let solutions = solver::solve(&mut ctx, &grammar, &formula, &backend, &options).unwrap();
    assert!(!solutions.is_empty());
    for tree in &solutions {
        let text = tree.to_source_string();
        let counts: Vec<usize> = text.split(';').map(|row| row.split(',').count()).collect();
        let colno = counts[0];
        assert!((3..=5).contains(&colno), "column count {colno} out of range in `{text}`");
        assert!(counts.iter().all(|&c| c == colno), "mismatched column counts in `{text}`");
    }
}
