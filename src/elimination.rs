//! Elimination transformers (spec.md §4.7): the fixed-priority rule that
//! turns one [`SolutionState`] into its successor states.

use std::collections::HashMap;

use crate::context::Context;
use crate::formula::{Formula, PredicateArg, SmtAtom, SmtTerm};
use crate::grammar::{Grammar, Reachability};
use crate::insertion;
use crate::match_engine::{MatchBindings, find_matches, no_open_leaf_may_match};
use crate::predicates::{self, SemPredResult};
use crate::smt::{ModelResult, SmtBackend, instantiate_model};
use crate::state::SolutionState;
use crate::substitution::{eliminate_dead_quantifiers, substitute, to_dnf, to_nnf};
use crate::tree::{self, DerivationTree, Path};
use crate::variable::Variable;

/// What applying the elimination transformer to a state produced.
pub enum Outcome {
    /// `tree` is closed and `formula` is `true`: a solution.
    Final(SolutionState),
    /// The disjunct is unsatisfiable; discard the state.
    Pruned,
    /// One or more successor states to requeue.
    Successors(Vec<SolutionState>),
}

fn conjuncts_of(formula: &Formula) -> Vec<Formula> {
    match formula {
        Formula::And(parts) => parts.clone(),
        Formula::True => Vec::new(),
        other => vec![other.clone()],
    }
}

fn term_ready(term: &SmtTerm, goal_tree: &DerivationTree) -> bool {
    match term {
        SmtTerm::Var(v) if *v == Variable::goal() => goal_tree.is_closed(),
        SmtTerm::Var(_) => true,
        SmtTerm::Tree(t) => t.is_closed(),
        SmtTerm::StringLiteral(_) | SmtTerm::IntLiteral(_) => true,
        SmtTerm::App(_, args) => args.iter().all(|a| term_ready(a, goal_tree)),
    }
}

/// An SMT atom is ready for the backend once none of its terms reference a
/// tree that is still mid-derivation, and the goal constant (if mentioned)
/// is only used once the whole state tree is closed (spec.md §4.7 rule 1).
fn atom_ready(atom: &SmtAtom, goal_tree: &DerivationTree) -> bool {
    atom.args.iter().all(|t| term_ready(t, goal_tree))
}

fn ground_goal(term: &SmtTerm, goal_tree: &DerivationTree) -> SmtTerm {
    match term {
        SmtTerm::Var(v) if *v == Variable::goal() => SmtTerm::Tree(goal_tree.clone()),
        SmtTerm::App(op, args) => {
            SmtTerm::App(op.clone(), args.iter().map(|a| ground_goal(a, goal_tree)).collect())
        }
        other => other.clone(),
    }
}

fn evaluate_ground_term(term: &SmtTerm) -> Option<String> {
    match term {
        SmtTerm::App(op, args) if op == "str.len" => {
            Some(evaluate_ground_term(args.first()?)?.chars().count().to_string())
        }
        other => other.ground_value(),
    }
}

/// Evaluate a fully ground SMT atom directly, without a backend round
/// trip, using the same small interpreted operator set as
/// [`crate::smt::EnumeratingBackend`].
fn evaluate_ground_atom(atom: &SmtAtom) -> Option<bool> {
    let values: Vec<Option<String>> = atom.args.iter().map(evaluate_ground_term).collect();
    match (atom.op.as_str(), values.as_slice()) {
        ("=", [Some(a), Some(b)]) => Some(a == b),
        ("!=", [Some(a), Some(b)]) => Some(a != b),
        ("str.contains", [Some(h), Some(n)]) => Some(h.contains(n.as_str())),
        ("str.prefixof", [Some(p), Some(w)]) => Some(w.starts_with(p.as_str())),
        ("str.suffixof", [Some(s), Some(w)]) => Some(w.ends_with(s.as_str())),
        ("<", [Some(a), Some(b)]) => Some(a.parse::<i64>().ok()? < b.parse::<i64>().ok()?),
        ("<=", [Some(a), Some(b)]) => Some(a.parse::<i64>().ok()? <= b.parse::<i64>().ok()?),
        (">", [Some(a), Some(b)]) => Some(a.parse::<i64>().ok()? > b.parse::<i64>().ok()?),
        (">=", [Some(a), Some(b)]) => Some(a.parse::<i64>().ok()? >= b.parse::<i64>().ok()?),
        _ => None,
    }
}

/// Resolve a predicate argument to the tree it currently denotes, reading
/// the goal constant off `goal_tree` (which keeps changing as the search
/// proceeds).
fn resolve<'a>(arg: &'a PredicateArg, goal_tree: &'a DerivationTree) -> Option<&'a DerivationTree> {
    match arg {
        PredicateArg::Tree(t) => Some(t),
        PredicateArg::Var(v) if *v == Variable::goal() => Some(goal_tree),
        PredicateArg::Var(_) | PredicateArg::Literal(_) => None,
    }
}

fn literal_of(arg: &PredicateArg) -> Option<&str> {
    match arg {
        PredicateArg::Literal(s) => Some(s),
        _ => None,
    }
}

fn var_of(arg: &PredicateArg) -> Option<&Variable> {
    match arg {
        PredicateArg::Var(v) => Some(v),
        _ => None,
    }
}

fn locate(tree: &DerivationTree, target_id: u64) -> Option<Path> {
    fn go(node: &DerivationTree, here: Path, target: u64) -> Option<Path> {
        if node.id() == target {
            return Some(here);
        }
        for (i, child) in node.children().iter().enumerate() {
            if let Some(found) = go(child, here.child(i), target) {
                return Some(found);
            }
        }
        None
    }
    go(tree, Path::root(), target_id)
}

/// Apply a semantic predicate's proposed substitution to the state: a
/// free-constant argument is rewritten at the formula level; an argument
/// that already denoted a concrete subtree of `state.tree` (a `binds_tree`
/// predicate) is rewritten in place by node identity (spec.md §4.5).
fn apply_proposal(
    ctx: &mut Context,
    state: &SolutionState,
    args: &[PredicateArg],
    proposal: &HashMap<Variable, DerivationTree>,
) -> SolutionState {
    let mut tree = state.tree.clone();
    let mut formula = state.formula.clone();
    for (var, replacement) in proposal {
        let original_id = args.iter().find_map(|a| match a {
            PredicateArg::Var(v) if v == var => resolve(a, &state.tree).map(DerivationTree::id),
            PredicateArg::Tree(t) => Some(t.id()),
            _ => None,
        });
        if let Some(id) = original_id {
            tree = tree.replace_by_id(id, replacement);
        }
        formula = substitute(ctx, &formula, var, replacement);
    }
    SolutionState::new(tree, formula)
}

fn collect_plain(node: &DerivationTree, here: Path, nonterminal: &str, out: &mut Vec<(Path, MatchBindings)>) {
    if node.symbol() == nonterminal {
        out.push((here.clone(), MatchBindings::new()));
    }
    for (i, child) in node.children().iter().enumerate() {
        collect_plain(child, here.child(i), nonterminal, out);
    }
}

/// Matches of `nonterminal` within `tree` when no bind expression narrows
/// the shape: every subtree whose own symbol is `nonterminal`.
fn find_matches_no_bind(tree: &DerivationTree, nonterminal: &str) -> Vec<(Path, MatchBindings)> {
    let mut out = Vec::new();
    collect_plain(tree, Path::root(), nonterminal, &mut out);
    out
}

fn instantiate_body(
    ctx: &mut Context,
    body: &Formula,
    var: &Variable,
    witness: &DerivationTree,
    range_tree: &DerivationTree,
    bindings: &MatchBindings,
) -> Formula {
    let mut out = body.clone();
    for (bound_var, bound_path) in bindings {
        if let Some(bound_tree) = range_tree.at(bound_path) {
            out = substitute(ctx, &out, bound_var, bound_tree);
        }
    }
    substitute(ctx, &out, var, witness)
}

/// Is `candidate` already one of `formula`'s top-level conjuncts? Used by
/// universal elimination to track which matches have already been
/// instantiated (spec.md §9 "track instantiated matches"): re-deriving the
/// same instantiated body on every step, with a tree that never expands,
/// would otherwise grow the formula forever without progress.
fn conjunct_already_present(formula: &Formula, candidate: &Formula) -> bool {
    conjuncts_of(formula).iter().any(|c| c == candidate)
}

fn drop_conjunct(formula: &Formula, target: &Formula) -> Formula {
    match formula {
        Formula::And(parts) => Formula::and(parts.iter().filter(|p| *p != target).cloned().collect()),
        other if other == target => Formula::True,
        other => other.clone(),
    }
}

fn drop_solved_atoms(formula: &Formula, solved: &[&SmtAtom]) -> Formula {
    match formula {
        Formula::Smt(atom) if solved.iter().any(|s| *s == atom) => Formula::True,
        Formula::And(parts) => Formula::and(parts.iter().map(|p| drop_solved_atoms(p, solved)).collect()),
        Formula::Or(parts) => Formula::or(parts.iter().map(|p| drop_solved_atoms(p, solved)).collect()),
        Formula::Not(inner) => Formula::not(drop_solved_atoms(inner, solved)),
        other => other.clone(),
    }
}

fn try_structural(state: &SolutionState, conjunct: &Formula, name: &str, args: &[PredicateArg]) -> Option<Outcome> {
    let mut paths = Vec::new();
    let mut literal = None;
    for arg in args {
        if let Some(lit) = literal_of(arg) {
            literal = Some(lit);
            continue;
        }
        let resolved = resolve(arg, &state.tree)?;
        let path = locate(&state.tree, resolved.id())?;
        paths.push(path);
    }
    let value = predicates::eval_structural(name, &state.tree, &paths, literal).ok()?;
    if value {
        let new_formula = drop_conjunct(&state.formula, conjunct);
        Some(Outcome::Successors(vec![SolutionState::new(state.tree.clone(), new_formula)]))
    } else {
        Some(Outcome::Pruned)
    }
}

fn try_semantic(
    ctx: &mut Context,
    grammar: &Grammar,
    state: &SolutionState,
    conjunct: &Formula,
    name: &str,
    args: &[PredicateArg],
) -> Option<Outcome> {
    let result = match name {
        "count" => {
            let t = resolve(&args[0], &state.tree)?;
            let nonterminal = literal_of(&args[1])?;
            let t_var = var_of(&args[0]).cloned().unwrap_or_else(Variable::goal);
            let n_var = var_of(&args[2]).cloned().unwrap_or_else(Variable::goal);
            predicates::eval_count(ctx, grammar, t, &t_var, nonterminal, &args[2], &n_var, &HashMap::new())
        }
        "crop" => {
            let t = resolve(&args[0], &state.tree)?;
            let width: usize = literal_of(&args[1])?.parse().ok()?;
            let t_var = var_of(&args[0]).cloned().unwrap_or_else(Variable::goal);
            predicates::eval_crop(ctx, grammar, t, &t_var, width)
        }
        "ljust" | "ljust_crop" | "rjust" | "rjust_crop" => {
            let t = resolve(&args[0], &state.tree)?;
            let width: usize = literal_of(&args[1])?.parse().ok()?;
            let fill: char = literal_of(&args[2])?.chars().next().unwrap_or(' ');
            let t_var = var_of(&args[0]).cloned().unwrap_or_else(Variable::goal);
            let side =
                if name.starts_with("ljust") { predicates::Justify::Left } else { predicates::Justify::Right };
            let allow_crop = name.ends_with("_crop");
            predicates::eval_justify(ctx, grammar, t, &t_var, width, fill, side, allow_crop)
        }
        "octal_to_decimal" => {
            let octal_tree = resolve(&args[0], &state.tree);
            let decimal_tree = resolve(&args[1], &state.tree);
            let octal_var = var_of(&args[0]).cloned().unwrap_or_else(Variable::goal);
            let decimal_var = var_of(&args[1]).cloned().unwrap_or_else(Variable::goal);
            predicates::eval_octal_to_decimal(
                ctx,
                octal_tree,
                &octal_var,
                "<octal>",
                decimal_tree,
                &decimal_var,
                "<decimal>",
            )
        }
        _ => return None,
    };

    match result {
        SemPredResult::Unready => None,
        SemPredResult::True => {
            let new_formula = drop_conjunct(&state.formula, conjunct);
            Some(Outcome::Successors(vec![SolutionState::new(state.tree.clone(), new_formula)]))
        }
        SemPredResult::False => Some(Outcome::Pruned),
        SemPredResult::Substitute(proposal) => {
            let new_state = apply_proposal(ctx, state, args, &proposal);
            let new_formula = drop_conjunct(&new_state.formula, conjunct);
            Some(Outcome::Successors(vec![SolutionState::new(new_state.tree, new_formula)]))
        }
    }
}

fn matches_for(
    range_tree: &DerivationTree,
    var: &Variable,
    bind: &Option<crate::variable::BindExpression>,
) -> Vec<(Path, MatchBindings)> {
    match bind {
        Some(b) => find_matches(range_tree, var.nonterminal(), b),
        None => find_matches_no_bind(range_tree, var.nonterminal()),
    }
}

/// Apply one step of the fixed-priority elimination transformer (spec.md
/// §4.7) to `state`.
pub fn step(
    ctx: &mut Context,
    grammar: &Grammar,
    reachability: &Reachability,
    backend: &dyn SmtBackend,
    state: &SolutionState,
) -> Outcome {
    let simplified = eliminate_dead_quantifiers(&to_dnf(&to_nnf(&state.formula)));
    if simplified == Formula::False {
        return Outcome::Pruned;
    }
    if let Formula::Or(disjuncts) = &simplified {
        return Outcome::Successors(
            disjuncts.iter().map(|d| SolutionState::new(state.tree.clone(), d.clone())).collect(),
        );
    }
    let state = SolutionState::new(state.tree.clone(), simplified);
    let state = &state;
    let conjuncts = conjuncts_of(&state.formula);

    // Rule 1: SMT conjunct block.
    let ready_smt: Vec<&SmtAtom> = conjuncts
        .iter()
        .filter_map(|f| match f {
            Formula::Smt(atom) if atom_ready(atom, &state.tree) => Some(atom),
            _ => None,
        })
        .collect();
    if !ready_smt.is_empty() {
        let grounded: Vec<SmtAtom> = ready_smt
            .iter()
            .map(|atom| {
                SmtAtom::new(atom.op.clone(), atom.args.iter().map(|t| ground_goal(t, &state.tree)).collect())
            })
            .collect();
        let mut vars: Vec<Variable> =
            ready_smt.iter().flat_map(|a| a.free_variables()).filter(|v| *v != Variable::goal()).collect();
        vars.sort();
        vars.dedup();

        let result = if vars.is_empty() {
            if grounded.iter().all(|a| evaluate_ground_atom(a).unwrap_or(false)) {
                ModelResult::Sat(HashMap::new())
            } else {
                ModelResult::Unsat
            }
        } else {
            backend.get_model(&grounded, &vars)
        };

        return match result {
            ModelResult::Sat(model) => {
                let formula = if model.is_empty() {
                    drop_solved_atoms(&state.formula, &ready_smt)
                } else {
                    match instantiate_model(grammar, ctx, &model) {
                        Some(trees) => {
                            let mut formula = state.formula.clone();
                            for (var, t) in &trees {
                                formula = substitute(ctx, &formula, var, t);
                            }
                            drop_solved_atoms(&formula, &ready_smt)
                        }
                        None => return Outcome::Pruned,
                    }
                };
                Outcome::Successors(vec![SolutionState::new(state.tree.clone(), formula)])
            }
            ModelResult::Unsat | ModelResult::Unknown => Outcome::Pruned,
        };
    }

    // Rule 2: ready semantic predicate.
    for conjunct in &conjuncts {
        if let Formula::SemanticPredicate { name, args, .. } = conjunct {
            if let Some(outcome) = try_semantic(ctx, grammar, state, conjunct, name, args) {
                return outcome;
            }
        }
    }

    // Structural predicates resolve as soon as their argument paths are
    // known; treated alongside rule 2 since both are pure, immediate
    // decisions once their arguments are ground.
    for conjunct in &conjuncts {
        if let Formula::StructuralPredicate { name, args } = conjunct {
            if let Some(outcome) = try_structural(state, conjunct, name, args) {
                return outcome;
            }
        }
    }

    // Rule 3: universal elimination.
    for conjunct in &conjuncts {
        if let Formula::Forall { var, bind, range, body } = conjunct {
            let Some(range_tree) = range.resolve(&state.tree) else { continue };
            let range_tree = range_tree.clone();
            let matches = matches_for(&range_tree, var, bind);

            let can_drop = no_open_leaf_may_match(&state.tree, reachability, var.nonterminal());
            if can_drop {
                let mut conjoined = state.formula.clone();
                for (match_path, bindings) in &matches {
                    if let Some(witness) = range_tree.at(match_path) {
                        let body_formula = instantiate_body(ctx, body, var, witness, &range_tree, bindings);
                        if !conjunct_already_present(&conjoined, &body_formula) {
                            conjoined = Formula::and(vec![conjoined, body_formula]);
                        }
                    }
                }
                let dropped = drop_conjunct(&conjoined, conjunct);
                return Outcome::Successors(vec![SolutionState::new(state.tree.clone(), dropped)]);
            }

            // Not yet droppable: only conjoin matches whose instantiated
            // body isn't already among this state's conjuncts. Otherwise
            // every step would re-derive the same already-present body
            // against an unchanged tree, growing the formula forever
            // while rule 5 (which would expand the tree and create new
            // matches) never gets a turn.
            let mut addition = None;
            for (match_path, bindings) in &matches {
                if let Some(witness) = range_tree.at(match_path) {
                    let body_formula = instantiate_body(ctx, body, var, witness, &range_tree, bindings);
                    if !conjunct_already_present(&state.formula, &body_formula) {
                        addition = Some(match addition {
                            Some(acc) => Formula::and(vec![acc, body_formula]),
                            None => body_formula,
                        });
                    }
                }
            }
            if let Some(addition) = addition {
                let conjoined = Formula::and(vec![state.formula.clone(), addition]);
                return Outcome::Successors(vec![SolutionState::new(state.tree.clone(), conjoined)]);
            }
            // Nothing new to instantiate against the current tree; fall
            // through so a later conjunct, or rule 5's expansion, can make
            // progress instead of looping on this one forever.
        }
    }

    // Rule 4: existential elimination.
    for conjunct in &conjuncts {
        if let Formula::Exists { var, bind, range, body } = conjunct {
            let mut successors = Vec::new();

            if let Some(range_tree) = range.resolve(&state.tree) {
                let range_tree = range_tree.clone();
                for (match_path, bindings) in matches_for(&range_tree, var, bind) {
                    if let Some(witness) = range_tree.at(&match_path) {
                        let body_formula = instantiate_body(ctx, body, var, witness, &range_tree, &bindings);
                        let new_formula =
                            drop_conjunct(&Formula::and(vec![state.formula.clone(), body_formula]), conjunct);
                        successors.push(SolutionState::new(state.tree.clone(), new_formula));
                    }
                }

                if let Some(b) = bind {
                    for embedded in insertion::embed(ctx, grammar, &state.tree, var.nonterminal(), b) {
                        if let Some((match_path, bindings)) =
                            find_matches(&embedded, var.nonterminal(), b).into_iter().next()
                        {
                            if let Some(witness) = embedded.at(&match_path) {
                                let body_formula = instantiate_body(ctx, body, var, witness, &embedded, &bindings);
                                let new_formula =
                                    drop_conjunct(&Formula::and(vec![state.formula.clone(), body_formula]), conjunct);
                                successors.push(SolutionState::new(embedded.clone(), new_formula));
                            }
                        }
                    }
                }
            }

            if !successors.is_empty() {
                return Outcome::Successors(successors);
            }
        }
    }

    // Rule 5: expansion of one open leaf (leftmost-topmost).
    if let Some((path, leaf)) = state.tree.open_leaves().into_iter().next() {
        let alt_count = grammar.alternatives(leaf.symbol()).map(|a| a.len()).unwrap_or(0);
        let mut successors = Vec::with_capacity(alt_count);
        for alt in 0..alt_count {
            if let Some(new_tree) = tree::expand_leaf(ctx, grammar, &state.tree, &path, alt) {
                successors.push(SolutionState::new(new_tree, state.formula.clone()));
            }
        }
        return Outcome::Successors(successors);
    }

    if state.tree.is_closed() && state.formula == Formula::True {
        Outcome::Final(SolutionState::new(state.tree.clone(), Formula::True))
    } else {
        Outcome::Pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::RangeExpr;
    use crate::grammar::{START_SYMBOL, Symbol};
    use crate::smt::EnumeratingBackend;
    use crate::tree::DerivationTree;

    fn var_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<var>")]);
        g.add_production("<var>", vec![Symbol::terminal("x")]);
        g.add_production("<var>", vec![Symbol::terminal("y")]);
        g
    }

    #[test]
    fn rule_one_prunes_unsatisfiable_ground_atom() {
        let mut ctx = Context::new();
        let grammar = var_grammar();
        let reach = grammar.reachability();
        let backend = EnumeratingBackend::default();
        let tree = DerivationTree::from_terminal_production(&mut ctx, "<var>", "x");
        let formula = Formula::Smt(SmtAtom::new(
            "=",
            vec![SmtTerm::StringLiteral("x".to_string()), SmtTerm::StringLiteral("y".to_string())],
        ));
        let state = SolutionState::new(tree, formula);
        match step(&mut ctx, &grammar, &reach, &backend, &state) {
            Outcome::Pruned => {}
            _ => panic!("expected Pruned"),
        }
    }

    #[test]
    fn rule_five_expands_an_open_leaf() {
        let mut ctx = Context::new();
        let grammar = var_grammar();
        let reach = grammar.reachability();
        let backend = EnumeratingBackend::default();
        let tree = DerivationTree::open(&mut ctx, START_SYMBOL);
        let state = SolutionState::new(tree, Formula::True);
        match step(&mut ctx, &grammar, &reach, &backend, &state) {
            Outcome::Successors(next) => assert_eq!(next.len(), 1),
            _ => panic!("expected Successors"),
        }
    }

    #[test]
    fn dead_quantifier_over_goal_reduces_to_true_and_closes() {
        let mut ctx = Context::new();
        let grammar = var_grammar();
        let reach = grammar.reachability();
        let backend = EnumeratingBackend::default();
        let tree = DerivationTree::from_terminal_production(&mut ctx, "<var>", "x");
        let bound = Variable::bound("y", "<var>");
        let formula = Formula::Forall {
            var: bound,
            bind: None,
            range: RangeExpr::Var(Variable::goal()),
            body: Box::new(Formula::True),
        };
        let state = SolutionState::new(tree, formula);
        match step(&mut ctx, &grammar, &reach, &backend, &state) {
            Outcome::Final(final_state) => assert!(final_state.is_final()),
            other => {
                let Outcome::Successors(succ) = other else { panic!("unexpected outcome") };
                assert_eq!(succ.len(), 1);
                assert_eq!(succ[0].formula, Formula::True);
            }
        }
    }
}
