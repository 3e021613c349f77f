//! Search cost accounting (spec.md §3 "Cost record", §4.9 "Solver
//! scheduler").

use std::collections::HashSet;

use crate::error::SolverError;
use crate::tree::DerivationTree;

/// One component vector: fixed length 5, plus an optional 6th slot active
/// only when global k-path coverage is tracked (spec.md §4.9).
#[derive(Clone, Debug, PartialEq)]
pub struct CostWeightVector(Vec<f64>);

impl CostWeightVector {
    /// Build a weight vector, validating its length against spec.md §4.9
    /// ("fixed length 5, optionally 6 when a global k-path component is
    /// active").
    pub fn new(weights: Vec<f64>) -> Result<Self, SolverError> {
        if weights.len() != 5 && weights.len() != 6 {
            return Err(SolverError::Specification(format!(
                "cost weight vector must have length 5 or 6, got {}",
                weights.len()
            )));
        }
        Ok(CostWeightVector(weights))
    }

    pub fn has_global_component(&self) -> bool {
        self.0.len() == 6
    }

    pub fn weights(&self) -> &[f64] {
        &self.0
    }
}

/// Parse a `-w w1,w2,w3,w4,w5` CLI argument (spec.md "CLI surface": length
/// 5 required, a data-format error otherwise). Distinct from
/// [`CostWeightVector::new`], which additionally permits a 6th,
/// internal-only global-coverage slot that is never user-supplied.
pub fn parse_weight_vector_arg(arg: &str) -> Result<CostWeightVector, SolverError> {
    let parts: Vec<&str> = arg.split(',').collect();
    if parts.len() != 5 {
        return Err(SolverError::Specification(format!(
            "length of weight vector is {}, expected 5",
            parts.len()
        )));
    }
    let mut weights = Vec::with_capacity(5);
    for part in parts {
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| SolverError::Specification(format!("non-numeric weight vector element '{part}'")))?;
        weights.push(value);
    }
    CostWeightVector::new(weights)
}

/// One (weight vector, phase length) pair in a phased schedule (spec.md
/// §4.9: "a sequence of (weight vector, phase length in steps) pairs;
/// phases cycle").
#[derive(Clone, Debug, PartialEq)]
pub struct CostPhase {
    pub weights: CostWeightVector,
    pub length: usize,
}

/// The cyclic phase schedule driving which weight vector applies to the
/// `step`-th state popped from the queue.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseSchedule {
    phases: Vec<CostPhase>,
}

impl PhaseSchedule {
    pub fn new(phases: Vec<CostPhase>) -> Result<Self, SolverError> {
        if phases.is_empty() {
            return Err(SolverError::Specification("a phase schedule needs at least one phase".to_string()));
        }
        if phases.iter().any(|p| p.length == 0) {
            return Err(SolverError::Specification("a phase's length must be positive".to_string()));
        }
        Ok(PhaseSchedule { phases })
    }

    pub fn single(weights: CostWeightVector) -> Self {
        PhaseSchedule { phases: vec![CostPhase { weights, length: 1 }] }
    }

    /// The weight vector active at scheduler step `step` (steps cycle
    /// through the phase list once the total phase length is exhausted).
    pub fn weights_at(&self, step: usize) -> &CostWeightVector {
        let total: usize = self.phases.iter().map(|p| p.length).sum();
        let mut offset = step % total;
        for phase in &self.phases {
            if offset < phase.length {
                return &phase.weights;
            }
            offset -= phase.length;
        }
        unreachable!("offset is always within the cycle's total length")
    }
}

/// Per-state components computed on insertion into the queue (spec.md §3
/// "Cost record").
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CostRecord {
    pub tree_closing_cost: f64,
    pub vacuous_quantifier_penalty: f64,
    pub constraint_cost: f64,
    pub derivation_depth_penalty: f64,
    pub local_k_path_penalty: f64,
    pub global_k_path_penalty: f64,
}

impl CostRecord {
    /// Weighted sum against `weights`, in the fixed component order of
    /// [`CostRecord`]'s fields; the 6th (global coverage) component
    /// contributes only when `weights` carries it.
    pub fn total(&self, weights: &CostWeightVector) -> f64 {
        let w = weights.weights();
        let mut total = w[0] * self.tree_closing_cost
            + w[1] * self.vacuous_quantifier_penalty
            + w[2] * self.constraint_cost
            + w[3] * self.derivation_depth_penalty
            + w[4] * self.local_k_path_penalty;
        if w.len() == 6 {
            total += w[5] * self.global_k_path_penalty;
        }
        total
    }
}

/// Compute the tree-shape-derived components of a state's cost record: the
/// remaining-depth proxy, the raw derivation depth, and the k-path
/// coverage deficit against everything seen so far.
pub fn tree_cost_components(
    tree: &DerivationTree,
    k: usize,
    globally_seen: &HashSet<Vec<String>>,
) -> (f64, f64, f64, f64) {
    let open_leaves = tree.open_leaves().len() as f64;
    let depth = tree.depth() as f64;
    let local_paths = tree.k_paths(k);
    let local_penalty = if local_paths.is_empty() {
        0.0
    } else {
        let novel = local_paths.iter().filter(|p| !globally_seen.contains(*p)).count();
        novel as f64 / local_paths.len() as f64
    };
    let global_penalty = local_penalty;
    (open_leaves, depth, local_penalty, global_penalty)
}

/// Console/log verbosity levels (spec.md "[ADDED] Logging / diagnostics").
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length_weight_vector() {
        assert!(CostWeightVector::new(vec![1.0, 2.0, 3.0]).is_err());
        assert!(CostWeightVector::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).is_ok());
        assert!(CostWeightVector::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).is_ok());
    }

    #[test]
    fn weight_vector_arg_rejects_4_and_6_length() {
        assert!(parse_weight_vector_arg("1,2,3,4").is_err());
        assert!(parse_weight_vector_arg("1,2,3,4,5,6").is_err());
    }

    #[test]
    fn weight_vector_arg_rejects_non_numeric_element() {
        assert!(parse_weight_vector_arg("1,2,x,4,5").is_err());
    }

    #[test]
    fn weight_vector_arg_accepts_valid_5_length_vector() {
        let weights = parse_weight_vector_arg("1,2,3,4,5").unwrap();
        assert_eq!(weights.weights(), &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn phase_schedule_cycles() {
        let a = CostWeightVector::new(vec![1.0; 5]).unwrap();
        let b = CostWeightVector::new(vec![2.0; 5]).unwrap();
        let schedule = PhaseSchedule::new(vec![
            CostPhase { weights: a.clone(), length: 2 },
            CostPhase { weights: b.clone(), length: 1 },
        ])
        .unwrap();
        assert_eq!(schedule.weights_at(0), &a);
        assert_eq!(schedule.weights_at(1), &a);
        assert_eq!(schedule.weights_at(2), &b);
        assert_eq!(schedule.weights_at(3), &a);
    }

    #[test]
    fn cost_record_total_ignores_global_component_for_5_vectors() {
        let record = CostRecord {
            tree_closing_cost: 1.0,
            vacuous_quantifier_penalty: 1.0,
            constraint_cost: 1.0,
            derivation_depth_penalty: 1.0,
            local_k_path_penalty: 1.0,
            global_k_path_penalty: 100.0,
        };
        let weights = CostWeightVector::new(vec![1.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(record.total(&weights), 5.0);
    }
}
