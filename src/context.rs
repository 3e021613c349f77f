//! Explicit counters threaded through the solver.
//!
//! The original implementation keeps the node-identity counter and the
//! dummy-variable counter process-wide. Here they live on a [`Context`] value
//! that callers own and can reset, so that two solver runs (or a test and the
//! code under test) never see accidentally-colliding identities.

/// Monotonically increasing identity for newly created derivation-tree
/// nodes, plus a counter for anonymous dummy variables introduced while
/// parsing bind expressions.
#[derive(Clone, Debug, Default)]
pub struct Context {
    next_node_id: u64,
    next_dummy_id: u64,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, never-before-used node identity.
    pub fn fresh_node_id(&mut self) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    /// Allocate a fresh dummy-variable name, unique within this context.
    pub fn fresh_dummy_name(&mut self) -> String {
        let id = self.next_dummy_id;
        self.next_dummy_id += 1;
        format!("$dummy{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique_and_increasing() {
        let mut ctx = Context::new();
        let a = ctx.fresh_node_id();
        let b = ctx.fresh_node_id();
        assert!(b > a);
    }

    #[test]
    fn dummy_names_are_unique() {
        let mut ctx = Context::new();
        let a = ctx.fresh_dummy_name();
        let b = ctx.fresh_dummy_name();
        assert_ne!(a, b);
    }

    #[test]
    fn fresh_context_starts_at_zero() {
        let mut ctx = Context::new();
        assert_eq!(ctx.fresh_node_id(), 0);
    }
}
