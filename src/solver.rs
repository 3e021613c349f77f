//! The priority-queue search scheduler (spec.md §4.9): pops the
//! lowest-cost state, applies the elimination transformer, and requeues
//! whatever it produces until a solution cap, timeout, or an empty queue
//! ends the search.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::{Duration, Instant};

use crate::context::Context;
use crate::cost::{CostRecord, CostWeightVector, PhaseSchedule, tree_cost_components};
use crate::elimination::{self, Outcome};
use crate::error::{SolverError, SolverResult};
use crate::formula::Formula;
use crate::grammar::{Grammar, START_SYMBOL};
use crate::smt::SmtBackend;
use crate::state::SolutionState;
use crate::substitution::{eliminate_dead_quantifiers, to_dnf, to_nnf, well_formed};
use crate::tree::DerivationTree;

/// Search configuration (spec.md §6 "Solver configuration").
pub struct SolverOptions {
    pub max_solutions: usize,
    pub timeout: Option<Duration>,
    /// Bounds on how many distinct models/instantiations the solver will
    /// accept from a free constant or an SMT conjunct block before giving
    /// up on that branch. Consulted by callers that want to cap search
    /// breadth; the scheduler itself bounds breadth primarily through
    /// `unique_trees_in_queue` and the cost ordering.
    pub max_free_instantiations: usize,
    pub max_smt_instantiations: usize,
    pub phases: PhaseSchedule,
    pub unique_trees_in_queue: bool,
    pub k_path_length: usize,
}

impl SolverOptions {
    pub fn new(phases: PhaseSchedule) -> Self {
        SolverOptions {
            max_solutions: 1,
            timeout: None,
            max_free_instantiations: 10,
            max_smt_instantiations: 10,
            phases,
            unique_trees_in_queue: true,
            k_path_length: 3,
        }
    }

    /// A single, uniform weight vector with every component equally
    /// weighted — a reasonable default before a caller has tuned phases.
    pub fn uniform_weights() -> SolverOptions {
        let weights = CostWeightVector::new(vec![1.0, 1.0, 1.0, 1.0, 1.0]).expect("length 5 is always valid");
        SolverOptions::new(PhaseSchedule::single(weights))
    }
}

struct QueueEntry {
    id: u64,
    cost: f64,
    state: SolutionState,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.id == other.id
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// `BinaryHeap` is a max-heap; reverse the cost comparison so the
    /// lowest-cost state always pops first, breaking exact ties in FIFO
    /// (insertion) order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
    }
}

fn conjunct_count(formula: &Formula) -> usize {
    match formula {
        Formula::And(parts) => parts.len(),
        Formula::True => 0,
        _ => 1,
    }
}

#[allow(clippy::too_many_arguments)]
fn push(
    queue: &mut BinaryHeap<QueueEntry>,
    seen_hashes: &mut HashSet<(u64, u64)>,
    next_id: &mut u64,
    state: SolutionState,
    options: &SolverOptions,
    globally_seen_paths: &mut HashSet<Vec<String>>,
) {
    if options.unique_trees_in_queue {
        // Dedup key is `(structural hash of T, normalized φ)` (spec.md
        // §4.9 "Deduplication"): the tree hash alone collides every DNF
        // disjunct and every un-droppable-universal/match-existing
        // successor that reuses the parent tree unchanged, even though
        // their formulas differ.
        let normalized = eliminate_dead_quantifiers(&to_dnf(&to_nnf(&state.formula)));
        let key = (state.tree.structural_hash(), normalized.structural_hash());
        if !seen_hashes.insert(key) {
            return;
        }
    }

    let id = *next_id;
    *next_id += 1;

    let weights = options.phases.weights_at(id as usize);
    let (open_leaves, depth, local_penalty, global_penalty) =
        tree_cost_components(&state.tree, options.k_path_length, globally_seen_paths);
    for path in state.tree.k_paths(options.k_path_length) {
        globally_seen_paths.insert(path);
    }
    let record = CostRecord {
        tree_closing_cost: open_leaves,
        vacuous_quantifier_penalty: 0.0,
        constraint_cost: conjunct_count(&state.formula) as f64,
        derivation_depth_penalty: depth,
        local_k_path_penalty: local_penalty,
        global_k_path_penalty: global_penalty,
    };
    let cost = record.total(weights);
    queue.push(QueueEntry { id, cost, state });
}

/// Search for up to `options.max_solutions` derivation trees satisfying
/// `formula` against `grammar` (spec.md §4.9 "Solver scheduler").
pub fn solve(
    ctx: &mut Context,
    grammar: &Grammar,
    formula: &Formula,
    backend: &dyn SmtBackend,
    options: &SolverOptions,
) -> SolverResult<Vec<DerivationTree>> {
    well_formed(formula)?;
    grammar.validate().map_err(SolverError::Specification)?;

    let reachability = grammar.reachability();
    let start_tree = DerivationTree::open(ctx, START_SYMBOL);
    let initial = SolutionState::new(start_tree, formula.clone());

    let started = Instant::now();
    let mut queue: BinaryHeap<QueueEntry> = BinaryHeap::new();
    let mut seen_hashes = HashSet::new();
    let mut globally_seen_paths = HashSet::new();
    let mut next_id = 0u64;
    let mut solutions = Vec::new();

    push(&mut queue, &mut seen_hashes, &mut next_id, initial, options, &mut globally_seen_paths);

    while let Some(entry) = queue.pop() {
        if let Some(timeout) = options.timeout {
            if started.elapsed() > timeout {
                break;
            }
        }

        match elimination::step(ctx, grammar, &reachability, backend, &entry.state) {
            Outcome::Final(solved) => {
                solutions.push(solved.tree);
                if solutions.len() >= options.max_solutions {
                    return Ok(solutions);
                }
            }
            Outcome::Pruned => {}
            Outcome::Successors(next_states) => {
                for next in next_states {
                    push(&mut queue, &mut seen_hashes, &mut next_id, next, options, &mut globally_seen_paths);
                }
            }
        }
    }

    if solutions.is_empty() { Err(SolverError::Exhausted) } else { Ok(solutions) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Symbol;
    use crate::smt::EnumeratingBackend;
    use crate::variable::Variable;

    fn var_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<var>")]);
        g.add_production("<var>", vec![Symbol::terminal("x")]);
        g.add_production("<var>", vec![Symbol::terminal("y")]);
        g
    }

    #[test]
    fn solves_a_trivially_satisfiable_grammar() {
        let mut ctx = Context::new();
        let grammar = var_grammar();
        let backend = EnumeratingBackend::default();
        let options = SolverOptions::uniform_weights();
        let solutions = solve(&mut ctx, &grammar, &Formula::True, &backend, &options).unwrap();
        assert_eq!(solutions.len(), 1);
        assert!(solutions[0].is_closed());
    }

    #[test]
    fn reports_exhausted_on_unsatisfiable_formula() {
        let mut ctx = Context::new();
        let grammar = var_grammar();
        let backend = EnumeratingBackend::default();
        let mut options = SolverOptions::uniform_weights();
        options.max_solutions = 1;
        let goal = Variable::goal();
        let formula = Formula::Smt(crate::formula::SmtAtom::new(
            "=",
            vec![crate::formula::SmtTerm::Var(goal), crate::formula::SmtTerm::StringLiteral("z".to_string())],
        ));
        let result = solve(&mut ctx, &grammar, &formula, &backend, &options);
        assert_eq!(result, Err(SolverError::Exhausted));
    }

    #[test]
    fn finds_multiple_distinct_solutions() {
        let mut ctx = Context::new();
        let grammar = var_grammar();
        let backend = EnumeratingBackend::default();
        let mut options = SolverOptions::uniform_weights();
        options.max_solutions = 2;
        let solutions = solve(&mut ctx, &grammar, &Formula::True, &backend, &options).unwrap();
        assert_eq!(solutions.len(), 2);
    }
}
