//! Scenario 1 (spec.md §8): `<start>→<stmt>`, `<stmt>→<assgn> ";" <stmt> |
//! <assgn>`, `<assgn>→<var> ":=" <rhs>`, `<rhs>→<var> | <digit>`,
//! `<var>→a..z`, `<digit>→0..9`. Constraint: every right-hand-side variable
//! has been the left-hand side of an earlier assignment.

use crate::builders::{and, before, bind, bind_lit, bind_var, exists_bind, forall, forall_bind, smt, var_term};
use crate::context::Context;
use crate::grammar::{Grammar, Symbol, START_SYMBOL};
use crate::smt::EnumeratingBackend;
use crate::solver::{self, SolverOptions};
use crate::variable::Variable;

fn assignment_language_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<stmt>")]);
    g.add_production(
        "<stmt>",
        vec![Symbol::nonterminal("<assgn>"), Symbol::terminal(";"), Symbol::nonterminal("<stmt>")],
    );
    g.add_production("<stmt>", vec![Symbol::nonterminal("<assgn>")]);
    g.add_production(
        "<assgn>",
        vec![Symbol::nonterminal("<var>"), Symbol::terminal(":="), Symbol::nonterminal("<rhs>")],
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

/// `forall <assgn> a=(lhs,":=",rhs) in start: forall <var> v in rhs:
/// exists <assgn> a2=(lhs2,":=",rhs2) in start: (before(a2, a) and lhs2 = v)`
/// — every right-hand-side variable must have been some earlier
/// assignment's left-hand side.
fn define_before_use_formula() -> crate::formula::Formula {
    let goal = Variable::goal();
    let lhs = Variable::bound("lhs", "<var>");
    let rhs = Variable::bound("rhs", "<rhs>");
    let a = Variable::bound("a", "<assgn>");
    let outer_bind = bind(vec![bind_var(&lhs), bind_lit(":="), bind_var(&rhs)]);

    let v = Variable::bound("v", "<var>");
    let lhs2 = Variable::bound("lhs2", "<var>");
    let rhs2 = Variable::bound("rhs2", "<rhs>");
    let a2 = Variable::bound("a2", "<assgn>");
    let inner_bind = bind(vec![bind_var(&lhs2), bind_lit(":="), bind_var(&rhs2)]);

    let exists_earlier_def = exists_bind(
        a2.clone(),
        inner_bind,
        &goal,
        and(vec![before(&a2, &a), smt("=", vec![var_term(&lhs2), var_term(&v)])]),
    );
    let for_every_rhs_var = forall(v, &rhs, exists_earlier_def);
    forall_bind(a, outer_bind, &goal, for_every_rhs_var)
}

#[test]
fn every_rhs_variable_was_defined_earlier() {
    let mut ctx = Context::new();
    let grammar = assignment_language_grammar();
    let formula = define_before_use_formula();
    let backend = EnumeratingBackend::default();
    let mut options = SolverOptions::uniform_weights();
    options.max_solutions = 6;

    let solutions = solver::solve(&mut ctx, &grammar, &formula, &backend, &options).unwrap();
    assert!(!solutions.is_empty());
    for tree in &solutions {
        let text = tree.to_source_string();
        let mut defined = std::collections::HashSet::new();
        for assignment in text.split(';') {
            let (lhs, rhs) = assignment.split_once(":=").expect("well-formed assignment");
            if rhs.chars().all(|c| c.is_ascii_digit()) {
                defined.insert(lhs.to_string());
                continue;
            }
            assert!(defined.contains(rhs), "{rhs} used in `{text}` before being defined");
            defined.insert(lhs.to_string());
        }
    }
}
