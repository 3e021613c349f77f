//! A thin CLI demo around the `gramsolve` library: runs the search over a
//! small built-in demo grammar and prints whatever solutions it finds.
//!
//! There is no concrete syntax for grammars or formulas in scope here, so
//! the demo grammar and constraint are both built programmatically with
//! [`gramsolve::builders`].

use clap::{Parser, Subcommand};

use gramsolve::builders::{exists, smt, str_lit, var_term};
use gramsolve::context::Context;
use gramsolve::cost::{self, PhaseSchedule, Verbosity};
use gramsolve::formula::Formula;
use gramsolve::grammar::{Grammar, Symbol, START_SYMBOL};
use gramsolve::report::Reporter;
use gramsolve::smt::EnumeratingBackend;
use gramsolve::solver::{self, SolverOptions};
use gramsolve::variable::Variable;

#[derive(Parser)]
#[command(name = "gramsolve", about = "Search a demo grammar for strings satisfying a demo constraint")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve the built-in demo grammar/constraint pair.
    Solve {
        /// Number of distinct solutions to produce.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Search timeout in seconds.
        #[arg(short = 't', long)]
        timeout_secs: Option<u64>,
        /// Verbosity: 0 quiet, 1 normal, 2 verbose, 3 debug.
        #[arg(short = 'v', long, default_value_t = 1)]
        verbosity: u8,
        /// Cost weight vector, e.g. `-w 1,1,1,1,1` (length 5 required).
        #[arg(short = 'w', long)]
        weights: Option<String>,
    },
}

fn verbosity_from(level: u8) -> Verbosity {
    match level {
        0 => Verbosity::Quiet,
        1 => Verbosity::Normal,
        2 => Verbosity::Verbose,
        _ => Verbosity::Debug,
    }
}

/// A tiny assignment-language grammar: `<var> := <var>`, closed over two
/// variable names, used to demonstrate a `before`-based define-before-use
/// constraint.
fn demo_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<var>")]);
    g.add_production("<var>", vec![Symbol::terminal("x")]);
    g.add_production("<var>", vec![Symbol::terminal("y")]);
    g
}

/// `exists x in start: x contains "y"`.
fn demo_formula() -> Formula {
    let goal = Variable::goal();
    let x = Variable::bound("x", "<var>");
    exists(x.clone(), &goal, smt("str.contains", vec![var_term(&x), str_lit("y")]))
}

/// Exit code for a malformed CLI argument such as a wrong-length or
/// non-numeric weight vector (spec.md "CLI surface": "distinct codes for
/// data-format errors").
const DATA_FORMAT_ERROR: i32 = 65;

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Solve { count, timeout_secs, verbosity, weights } => {
            let mut reporter = Reporter::new(verbosity_from(verbosity));
            let mut ctx = Context::new();
            let grammar = demo_grammar();
            let formula = demo_formula();
            let backend = EnumeratingBackend::default();
            let mut options = SolverOptions::uniform_weights();
            options.max_solutions = count;
            options.timeout = timeout_secs.map(std::time::Duration::from_secs);
            if let Some(arg) = weights {
                match cost::parse_weight_vector_arg(&arg) {
                    Ok(w) => options.phases = PhaseSchedule::single(w),
                    Err(err) => {
                        eprintln!("error: {err}");
                        std::process::exit(DATA_FORMAT_ERROR);
                    }
                }
            }

            match solver::solve(&mut ctx, &grammar, &formula, &backend, &options) {
                Ok(trees) => {
                    for tree in &trees {
                        reporter.solution_found(tree);
                    }
                }
                Err(_) => reporter.unsat(),
            }
        }
    }
}
