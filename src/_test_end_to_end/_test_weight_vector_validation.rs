//! Scenario 6 (spec.md §8 / §6 "CLI surface"): `-w` takes a weight vector
//! of exactly five comma-separated numbers. A 4- or 6-length vector, or a
//! 5-length vector with a non-numeric element, is a data-format error; a
//! valid 5-length numeric vector is accepted and drives a normal search.

use crate::cost::{parse_weight_vector_arg, PhaseSchedule};
use crate::context::Context;
use crate::formula::Formula;
use crate::grammar::{Grammar, Symbol, START_SYMBOL};
use crate::smt::EnumeratingBackend;
use crate::solver::{self, SolverOptions};

fn var_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<var>")]);
    g.add_production("<var>", vec![Symbol::terminal("x")]);
    g.add_production("<var>", vec![Symbol::terminal("y")]);
    g
}

#[test]
fn four_length_vector_is_a_data_format_error() {
    assert!(parse_weight_vector_arg("1,2,3,4").is_err());
}

#[test]
fn six_length_vector_is_a_data_format_error() {
    assert!(parse_weight_vector_arg("1,2,3,4,5,6").is_err());
}

#[test]
fn five_length_non_numeric_vector_is_a_data_format_error() {
    assert!(parse_weight_vector_arg("1,2,oops,4,5").is_err());
}

#[test]
fn valid_five_length_vector_admits_normal_operation() {
    let weights = parse_weight_vector_arg("2,1,1,1,1").expect("a valid 5-length vector must parse");

    let mut ctx = Context::new();
    let grammar = var_grammar();
    let backend = EnumeratingBackend::default();
    let mut options = SolverOptions::uniform_weights();
    options.phases = PhaseSchedule::single(weights);

    let solutions = solver::solve(&mut ctx, &grammar, &Formula::True, &backend, &options).unwrap();
    assert_eq!(solutions.len(), 1);
    assert!(solutions[0].is_closed());
}
