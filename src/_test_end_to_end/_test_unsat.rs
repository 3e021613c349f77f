//! Scenario 5 (spec.md §8): `<start>→<a>`, `<a>→"A"`, constraint
//! `exists <a>: <a> = "B"`. The queue empties without ever producing a
//! tree whose single possible string image ("A") can satisfy the
//! constraint, so the solver must report `UNSAT` with zero emissions.

use crate::builders::{exists, smt, str_lit, var_term};
use crate::context::Context;
use crate::error::SolverError;
use crate::grammar::{Grammar, Symbol, START_SYMBOL};
use crate::smt::EnumeratingBackend;
use crate::solver::{self, SolverOptions};
use crate::variable::Variable;

fn single_letter_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<a>")]);
    g.add_production("<a>", vec![Symbol::terminal("A")]);
    g
}

/// `exists <a>: <a> = "B"`.
fn unsatisfiable_formula() -> crate::formula::Formula {
    let goal = Variable::goal();
    let a = Variable::bound("a", "<a>");
    exists(a.clone(), &goal, smt("=", vec![var_term(&a), str_lit("B")]))
}

#[test]
fn exhausts_the_queue_and_reports_unsat() {
    let mut ctx = Context::new();
    let grammar = single_letter_grammar();
    let formula = unsatisfiable_formula();
    let backend = EnumeratingBackend::default();
    let options = SolverOptions::uniform_weights();

    let result = solver::solve(&mut ctx, &grammar, &formula, &backend, &options);
    assert_eq!(result, Err(SolverError::Exhausted));
}
