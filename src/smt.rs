//! The SMT bridge (spec.md §4.6): the backend contract, tree-aware
//! instantiation of returned models, and the bundled backends.

use std::collections::HashMap;

use crate::context::Context;
use crate::formula::{SmtAtom, SmtTerm};
use crate::grammar::Grammar;
use crate::parser;
use crate::tree::DerivationTree;
use crate::variable::{NUM_TYPE, Variable};

/// The outcome of asking a backend for a joint model of a conjunction of
/// SMT atoms.
#[derive(Clone, Debug)]
pub enum ModelResult {
    Sat(HashMap<Variable, String>),
    Unsat,
    /// Treated as `Unsat` for search soundness (spec.md §4.6); kept as a
    /// distinct variant so callers can log it differently.
    Unknown,
}

/// The minimal capability the core requires of an SMT solver (spec.md §6
/// "SMT backend contract"): validity/satisfiability checking and model
/// generation over string-typed free variables.
pub trait SmtBackend {
    /// Is the conjunction of `atoms` satisfiable?
    fn check_sat(&self, atoms: &[SmtAtom]) -> ModelResult;

    /// Ask for one satisfying assignment of `vars` under the conjunction of
    /// `atoms`. Callers wanting several distinct models (bounded by
    /// `max_smt_instantiations`) call this repeatedly, each time adding a
    /// disequality atom excluding the previously returned assignment.
    fn get_model(&self, atoms: &[SmtAtom], vars: &[Variable]) -> ModelResult;
}

/// Each returned model string is parsed against `grammar` rooted at its
/// variable's declared nonterminal type; a model whose string does not
/// reparse is dropped (spec.md §4.6 "tree-aware instantiation" — a backend
/// pruning outcome, never an error, per spec.md §7 category 2).
pub fn instantiate_model(
    grammar: &Grammar,
    ctx: &mut Context,
    model: &HashMap<Variable, String>,
) -> Option<HashMap<Variable, DerivationTree>> {
    let mut out = HashMap::with_capacity(model.len());
    for (var, text) in model {
        // `NUM` is the distinguished numeric type (spec.md §3 "Variable"),
        // never a grammar nonterminal, so a numeric model value is built
        // directly rather than reparsed against `grammar` (the same move
        // `eval_count` makes via `from_terminal_production`).
        let tree = if var.nonterminal() == NUM_TYPE {
            DerivationTree::from_terminal_production(ctx, NUM_TYPE, text.clone())
        } else {
            parser::parse(grammar, ctx, var.nonterminal(), text)?
        };
        out.insert(var.clone(), tree);
    }
    Some(out)
}

fn ground_string(term: &SmtTerm) -> Option<String> {
    term.ground_value()
}

/// A simple, dependency-free backend used as the default and in tests: it
/// enumerates candidate string assignments drawn from a small built-in
/// vocabulary plus the atoms' own string literals, and accepts the first
/// assignment that satisfies every atom under a tiny interpreted subset of
/// SMT-LIB string/arithmetic operators (`=`, `not`, `str.contains`,
/// `str.prefixof`, `str.suffixof`, `str.len`, `<`, `<=`, `>`, `>=`).
///
/// It is not a general-purpose solver; grammars whose constraints need
/// real nonlinear or quantified string reasoning should enable
/// `z3-backend` instead.
#[derive(Clone, Debug, Default)]
pub struct EnumeratingBackend {
    pub vocabulary: Vec<String>,
}

impl EnumeratingBackend {
    pub fn new(vocabulary: Vec<String>) -> Self {
        EnumeratingBackend { vocabulary }
    }

    fn candidates(&self, atoms: &[SmtAtom]) -> Vec<String> {
        let mut out = self.vocabulary.clone();
        for atom in atoms {
            for arg in &atom.args {
                if let Some(s) = ground_string(arg) {
                    out.push(s);
                }
            }
        }
        out.push(String::new());
        out.dedup();
        out
    }

    fn eval_bool(&self, atom: &SmtAtom, assignment: &HashMap<Variable, String>) -> Option<bool> {
        let values: Vec<Option<String>> = atom
            .args
            .iter()
            .map(|t| eval_term(t, assignment))
            .collect();
        match (atom.op.as_str(), values.as_slice()) {
            ("=", [Some(a), Some(b)]) => Some(a == b),
            ("!=", [Some(a), Some(b)]) => Some(a != b),
            ("str.contains", [Some(haystack), Some(needle)]) => Some(haystack.contains(needle.as_str())),
            ("str.prefixof", [Some(prefix), Some(whole)]) => Some(whole.starts_with(prefix.as_str())),
            ("str.suffixof", [Some(suffix), Some(whole)]) => Some(whole.ends_with(suffix.as_str())),
            ("<", [Some(a), Some(b)]) => Some(num(a)? < num(b)?),
            ("<=", [Some(a), Some(b)]) => Some(num(a)? <= num(b)?),
            (">", [Some(a), Some(b)]) => Some(num(a)? > num(b)?),
            (">=", [Some(a), Some(b)]) => Some(num(a)? >= num(b)?),
            _ => None,
        }
    }
}

fn num(s: &str) -> Option<i64> {
    s.parse().ok()
}

fn eval_term(term: &SmtTerm, assignment: &HashMap<Variable, String>) -> Option<String> {
    match term {
        SmtTerm::Var(v) => assignment.get(v).cloned(),
        SmtTerm::Tree(_) | SmtTerm::StringLiteral(_) | SmtTerm::IntLiteral(_) => term.ground_value(),
        SmtTerm::App(op, args) if op == "str.len" => {
            let inner = eval_term(args.first()?, assignment)?;
            Some(inner.chars().count().to_string())
        }
        SmtTerm::App(_, _) => None,
    }
}

impl SmtBackend for EnumeratingBackend {
    fn check_sat(&self, atoms: &[SmtAtom]) -> ModelResult {
        let all_vars: Vec<Variable> = {
            let mut vs: Vec<Variable> = atoms.iter().flat_map(SmtAtom::free_variables).collect();
            vs.sort();
            vs.dedup();
            vs
        };
        match self.get_model(atoms, &all_vars) {
            ModelResult::Sat(_) => ModelResult::Sat(HashMap::new()),
            other => other,
        }
    }

    fn get_model(&self, atoms: &[SmtAtom], vars: &[Variable]) -> ModelResult {
        if vars.is_empty() {
            let satisfied = atoms.iter().all(|a| self.eval_bool(a, &HashMap::new()).unwrap_or(false));
            return if satisfied { ModelResult::Sat(HashMap::new()) } else { ModelResult::Unsat };
        }
        let candidates = self.candidates(atoms);
        let mut found = HashMap::new();
        search(vars, &candidates, &mut HashMap::new(), atoms, self, &mut found);
        if found.is_empty() { ModelResult::Unsat } else { ModelResult::Sat(found) }
    }
}

fn search(
    remaining: &[Variable],
    candidates: &[String],
    assignment: &mut HashMap<Variable, String>,
    atoms: &[SmtAtom],
    backend: &EnumeratingBackend,
    found: &mut HashMap<Variable, String>,
) -> bool {
    if !found.is_empty() {
        return true;
    }
    let Some((first, rest)) = remaining.split_first() else {
        let ok = atoms.iter().all(|a| backend.eval_bool(a, assignment).unwrap_or(false));
        if ok {
            found.extend(assignment.clone());
        }
        return ok;
    };
    for candidate in candidates {
        assignment.insert(first.clone(), candidate.clone());
        if search(rest, candidates, assignment, atoms, backend, found) {
            return true;
        }
        assignment.remove(first);
    }
    false
}

#[cfg(feature = "z3-backend")]
pub mod z3_backend {
    //! The real SMT bridge, backed by the `z3` crate. Feature-gated so the
    //! crate builds without a native Z3 install.

    use super::{ModelResult, SmtAtom, SmtBackend, SmtTerm};
    use crate::variable::Variable;
    use std::collections::HashMap;
    use z3::ast::{Ast, Bool, String as Z3String};
    use z3::{Config, Context as Z3Context, SatResult, Solver};

    pub struct Z3Backend {
        config: Config,
    }

    impl Default for Z3Backend {
        fn default() -> Self {
            Z3Backend { config: Config::new() }
        }
    }

    impl Z3Backend {
        pub fn new() -> Self {
            Self::default()
        }

        fn lower_term<'c>(&self, ctx: &'c Z3Context, term: &SmtTerm, vars: &mut HashMap<Variable, Z3String<'c>>) -> Z3String<'c> {
            match term {
                SmtTerm::Var(v) => vars
                    .entry(v.clone())
                    .or_insert_with(|| Z3String::new_const(ctx, v.name()))
                    .clone(),
                SmtTerm::Tree(t) => Z3String::from_str(ctx, &t.to_source_string()).unwrap(),
                SmtTerm::StringLiteral(s) => Z3String::from_str(ctx, s).unwrap(),
                SmtTerm::IntLiteral(n) => Z3String::from_str(ctx, &n.to_string()).unwrap(),
                SmtTerm::App(..) => Z3String::from_str(ctx, "").unwrap(),
            }
        }

        fn lower_atom<'c>(&self, ctx: &'c Z3Context, atom: &SmtAtom, vars: &mut HashMap<Variable, Z3String<'c>>) -> Bool<'c> {
            match atom.op.as_str() {
                "=" if atom.args.len() == 2 => {
                    let a = self.lower_term(ctx, &atom.args[0], vars);
                    let b = self.lower_term(ctx, &atom.args[1], vars);
                    a._eq(&b)
                }
                "str.contains" if atom.args.len() == 2 => {
                    let haystack = self.lower_term(ctx, &atom.args[0], vars);
                    let needle = self.lower_term(ctx, &atom.args[1], vars);
                    haystack.contains(&needle)
                }
                "str.prefixof" if atom.args.len() == 2 => {
                    let prefix = self.lower_term(ctx, &atom.args[0], vars);
                    let whole = self.lower_term(ctx, &atom.args[1], vars);
                    whole.prefix(&prefix)
                }
                "str.suffixof" if atom.args.len() == 2 => {
                    let suffix = self.lower_term(ctx, &atom.args[0], vars);
                    let whole = self.lower_term(ctx, &atom.args[1], vars);
                    whole.suffix(&suffix)
                }
                _ => Bool::from_bool(ctx, true),
            }
        }
    }

    impl SmtBackend for Z3Backend {
        fn check_sat(&self, atoms: &[SmtAtom]) -> ModelResult {
            self.get_model(atoms, &[])
        }

        fn get_model(&self, atoms: &[SmtAtom], vars_wanted: &[Variable]) -> ModelResult {
            let ctx = Z3Context::new(&self.config);
            let solver = Solver::new(&ctx);
            let mut vars = HashMap::new();
            for atom in atoms {
                solver.assert(&self.lower_atom(&ctx, atom, &mut vars));
            }
            match solver.check() {
                SatResult::Unsat => ModelResult::Unsat,
                SatResult::Unknown => ModelResult::Unknown,
                SatResult::Sat => {
                    let model = solver.get_model().expect("sat result carries a model");
                    let mut out = HashMap::new();
                    for var in vars_wanted {
                        let z3_var = vars.entry(var.clone()).or_insert_with(|| Z3String::new_const(&ctx, var.name()));
                        if let Some(value) = model.eval(z3_var, true).and_then(|v| v.as_string()) {
                            out.insert(var.clone(), value);
                        }
                    }
                    ModelResult::Sat(out)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerating_backend_solves_equality() {
        let backend = EnumeratingBackend::new(vec!["x".to_string(), "y".to_string()]);
        let v = Variable::constant("c", "<var>");
        let atom = SmtAtom::new("=", vec![SmtTerm::Var(v.clone()), SmtTerm::StringLiteral("y".to_string())]);
        match backend.get_model(&[atom], &[v.clone()]) {
            ModelResult::Sat(model) => assert_eq!(model.get(&v), Some(&"y".to_string())),
            other => panic!("expected Sat, got {other:?}"),
        }
    }

    #[test]
    fn enumerating_backend_reports_unsat() {
        let backend = EnumeratingBackend::new(vec!["x".to_string()]);
        let v = Variable::constant("c", "<var>");
        let atom = SmtAtom::new("=", vec![SmtTerm::Var(v.clone()), SmtTerm::StringLiteral("nope".to_string())]);
        let restrict = SmtAtom::new("=", vec![SmtTerm::Var(v.clone()), SmtTerm::StringLiteral("x".to_string())]);
        match backend.get_model(&[atom, restrict], &[v]) {
            ModelResult::Unsat => {}
            other => panic!("expected Unsat, got {other:?}"),
        }
    }

    #[test]
    fn instantiate_model_reparses_against_declared_nonterminal() {
        let mut ctx = Context::new();
        let mut grammar = Grammar::new();
        grammar.add_production(crate::grammar::START_SYMBOL, vec![crate::grammar::Symbol::nonterminal("<var>")]);
        grammar.add_production("<var>", vec![crate::grammar::Symbol::terminal("x")]);
        let v = Variable::constant("c", "<var>");
        let mut model = HashMap::new();
        model.insert(v.clone(), "x".to_string());
        let trees = instantiate_model(&grammar, &mut ctx, &model).unwrap();
        assert_eq!(trees.get(&v).unwrap().to_source_string(), "x");
    }

    #[test]
    fn instantiate_model_rejects_non_reparsing_string() {
        let mut ctx = Context::new();
        let mut grammar = Grammar::new();
        grammar.add_production(crate::grammar::START_SYMBOL, vec![crate::grammar::Symbol::nonterminal("<var>")]);
        grammar.add_production("<var>", vec![crate::grammar::Symbol::terminal("x")]);
        let v = Variable::constant("c", "<var>");
        let mut model = HashMap::new();
        model.insert(v, "not-in-language".to_string());
        assert!(instantiate_model(&grammar, &mut ctx, &model).is_none());
    }
}
