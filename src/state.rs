//! Solution states (spec.md §3 "Solution state"): a derivation tree paired
//! with the formula still to be discharged against it.

use crate::formula::Formula;
use crate::tree::DerivationTree;

/// A pair (T₀, φ). `tree` is always a legal partial derivation of
/// `<start>`; `formula`'s free constants include the goal constant, bound
/// implicitly to `tree` itself rather than carried in a side table, since
/// `tree` keeps changing as the search proceeds (spec.md §3).
#[derive(Clone, Debug)]
pub struct SolutionState {
    pub tree: DerivationTree,
    pub formula: Formula,
}

impl SolutionState {
    pub fn new(tree: DerivationTree, formula: Formula) -> Self {
        SolutionState { tree, formula }
    }

    /// A state is final once its tree has no open leaves and its formula
    /// has simplified to `true` (spec.md §4.7).
    pub fn is_final(&self) -> bool {
        self.tree.is_closed() && self.formula == Formula::True
    }
}
