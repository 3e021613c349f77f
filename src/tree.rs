//! Derivation trees (spec.md §3 "Derivation tree") over a [`Grammar`].
//!
//! A tree is either an open leaf (a nonterminal with no chosen expansion
//! yet) or a node with an ordered list of children. Every node carries a
//! stable identity assigned once, at construction, so two structurally
//! identical subtrees produced by different insertion steps remain
//! distinguishable to the match engine and to `same_position`/
//! `different_position` (spec.md §4.4).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::context::Context;
use crate::grammar::{Expansion, Grammar, Symbol};

/// A position inside a derivation tree: the sequence of child indices from
/// the root down to the addressed node. The empty path addresses the root.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Path(pub Vec<usize>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn child(&self, index: usize) -> Path {
        let mut steps = self.0.clone();
        steps.push(index);
        Path(steps)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Is `self` a strict prefix of `other`, i.e. does `other` address a
    /// node at or below `self`?
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Lexicographic ordering used by the `before`/`after` structural
    /// predicates (spec.md §4.4): a node is "before" another if at the
    /// first path index where they diverge its sibling index is smaller.
    /// A path that is a prefix of the other (an ancestor/descendant pair)
    /// precedes nothing and is preceded by nothing: neither is "before"
    /// the other, since they never diverge.
    pub fn precedes(&self, other: &Path) -> bool {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            if a != b {
                return a < b;
            }
        }
        false
    }
}

/// The content of one derivation-tree node.
#[derive(Clone, Debug)]
pub enum NodeValue {
    /// An unexpanded nonterminal: an open leaf.
    Open(String),
    /// A terminal leaf holding literal text.
    Terminal(String),
    /// An expanded nonterminal with its children, in production order.
    Expanded(String, Vec<DerivationTree>),
}

/// A derivation tree: a node value plus the stable identity assigned to it
/// when it was created.
#[derive(Clone, Debug)]
pub struct DerivationTree {
    id: u64,
    value: NodeValue,
}

impl DerivationTree {
    pub fn open(ctx: &mut Context, nonterminal: impl Into<String>) -> Self {
        DerivationTree { id: ctx.fresh_node_id(), value: NodeValue::Open(nonterminal.into()) }
    }

    pub fn terminal(ctx: &mut Context, text: impl Into<String>) -> Self {
        DerivationTree { id: ctx.fresh_node_id(), value: NodeValue::Terminal(text.into()) }
    }

    pub fn expanded(ctx: &mut Context, nonterminal: impl Into<String>, children: Vec<DerivationTree>) -> Self {
        DerivationTree {
            id: ctx.fresh_node_id(),
            value: NodeValue::Expanded(nonterminal.into(), children),
        }
    }

    /// Build a fully expanded one-terminal-child nonterminal node, the
    /// common case when substituting a direct terminal production.
    pub fn from_terminal_production(ctx: &mut Context, nonterminal: impl Into<String>, text: impl Into<String>) -> Self {
        let leaf = DerivationTree::terminal(ctx, text);
        DerivationTree::expanded(ctx, nonterminal, vec![leaf])
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    /// The nonterminal or terminal symbol naming this node's own position.
    pub fn symbol(&self) -> &str {
        match &self.value {
            NodeValue::Open(nt) => nt,
            NodeValue::Expanded(nt, _) => nt,
            NodeValue::Terminal(text) => text,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.value, NodeValue::Open(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.value, NodeValue::Terminal(_))
    }

    /// A tree is closed when it contains no open leaves anywhere in it.
    pub fn is_closed(&self) -> bool {
        match &self.value {
            NodeValue::Open(_) => false,
            NodeValue::Terminal(_) => true,
            NodeValue::Expanded(_, children) => children.iter().all(DerivationTree::is_closed),
        }
    }

    pub fn children(&self) -> &[DerivationTree] {
        match &self.value {
            NodeValue::Expanded(_, children) => children,
            _ => &[],
        }
    }

    /// Render the leaves' terminal text, left to right. Meaningful only
    /// once the tree is closed; open leaves contribute nothing.
    pub fn to_source_string(&self) -> String {
        let mut out = String::new();
        self.collect_source(&mut out);
        out
    }

    fn collect_source(&self, out: &mut String) {
        match &self.value {
            NodeValue::Terminal(text) => out.push_str(text),
            NodeValue::Open(_) => {}
            NodeValue::Expanded(_, children) => {
                for child in children {
                    child.collect_source(out);
                }
            }
        }
    }

    /// All open leaves, paired with their path from this node.
    pub fn open_leaves(&self) -> Vec<(Path, &DerivationTree)> {
        let mut out = Vec::new();
        self.collect_open_leaves(Path::root(), &mut out);
        out
    }

    fn collect_open_leaves<'a>(&'a self, here: Path, out: &mut Vec<(Path, &'a DerivationTree)>) {
        match &self.value {
            NodeValue::Open(_) => out.push((here, self)),
            NodeValue::Terminal(_) => {}
            NodeValue::Expanded(_, children) => {
                for (i, child) in children.iter().enumerate() {
                    child.collect_open_leaves(here.child(i), out);
                }
            }
        }
    }

    /// Look up the subtree at `path`, or `None` if the path runs off the
    /// tree (addresses a terminal leaf's nonexistent child, or an index out
    /// of bounds at some level).
    pub fn at(&self, path: &Path) -> Option<&DerivationTree> {
        let mut node = self;
        for &step in &path.0 {
            node = node.children().get(step)?;
        }
        Some(node)
    }

    /// Functionally replace the subtree at `path` with `replacement`,
    /// returning a new tree. The identities of every node not on the
    /// replaced path are preserved unchanged.
    pub fn replace_at(&self, path: &Path, replacement: DerivationTree) -> DerivationTree {
        if path.0.is_empty() {
            return replacement;
        }
        match &self.value {
            NodeValue::Expanded(nt, children) => {
                let mut new_children = children.clone();
                let idx = path.0[0];
                let rest = Path(path.0[1..].to_vec());
                new_children[idx] = new_children[idx].replace_at(&rest, replacement);
                DerivationTree { id: self.id, value: NodeValue::Expanded(nt.clone(), new_children) }
            }
            _ => replacement,
        }
    }

    /// Replace the node with identity `target_id`, wherever it occurs in
    /// this tree, with `replacement`. Used when a semantic predicate with
    /// `binds_tree` semantics (spec.md §4.5) proposes swapping out a
    /// subtree it was given by reference rather than by formula variable.
    pub fn replace_by_id(&self, target_id: u64, replacement: &DerivationTree) -> DerivationTree {
        if self.id == target_id {
            return replacement.clone();
        }
        match &self.value {
            NodeValue::Expanded(nt, children) => {
                let new_children =
                    children.iter().map(|c| c.replace_by_id(target_id, replacement)).collect();
                DerivationTree { id: self.id, value: NodeValue::Expanded(nt.clone(), new_children) }
            }
            _ => self.clone(),
        }
    }

    /// Depth of this tree (a leaf has depth 0).
    pub fn depth(&self) -> usize {
        match &self.value {
            NodeValue::Expanded(_, children) => {
                1 + children.iter().map(DerivationTree::depth).max().unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Enumerate every k-length path of nonterminal/terminal symbols
    /// through this tree, for the coverage component of the search cost
    /// (spec.md §7.3 "k-path coverage").
    pub fn k_paths(&self, k: usize) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let mut trail = Vec::new();
        self.collect_k_paths(k, &mut trail, &mut out);
        out
    }

    fn collect_k_paths(&self, k: usize, trail: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        trail.push(self.symbol().to_string());
        if trail.len() >= k {
            out.push(trail[trail.len() - k..].to_vec());
        }
        for child in self.children() {
            child.collect_k_paths(k, trail, out);
        }
        trail.pop();
    }

    /// A content hash used to deduplicate trees produced by different
    /// insertion steps that happen to coincide (spec.md §5.5): hashes node
    /// values structurally, ignoring node identities.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_structural(&mut hasher);
        hasher.finish()
    }

    fn hash_structural<H: Hasher>(&self, hasher: &mut H) {
        match &self.value {
            NodeValue::Open(nt) => {
                0u8.hash(hasher);
                nt.hash(hasher);
            }
            NodeValue::Terminal(text) => {
                1u8.hash(hasher);
                text.hash(hasher);
            }
            NodeValue::Expanded(nt, children) => {
                2u8.hash(hasher);
                nt.hash(hasher);
                children.len().hash(hasher);
                for child in children {
                    child.hash_structural(hasher);
                }
            }
        }
    }
}

/// Structural equality (node values and shape), ignoring identities.
impl PartialEq for DerivationTree {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (NodeValue::Open(a), NodeValue::Open(b)) => a == b,
            (NodeValue::Terminal(a), NodeValue::Terminal(b)) => a == b,
            (NodeValue::Expanded(a, ca), NodeValue::Expanded(b, cb)) => a == b && ca == cb,
            _ => false,
        }
    }
}
impl Eq for DerivationTree {}

/// Expand the open leaf at `path` by one production, choosing
/// `alternative_index` among `grammar`'s alternatives for that leaf's
/// nonterminal. Every freshly introduced child is an open leaf (or a
/// terminal leaf, for a literal symbol), each given its own fresh identity.
pub fn expand_leaf(
    ctx: &mut Context,
    grammar: &Grammar,
    tree: &DerivationTree,
    path: &Path,
    alternative_index: usize,
) -> Option<DerivationTree> {
    let leaf = tree.at(path)?;
    let NodeValue::Open(nonterminal) = &leaf.value else { return None };
    let alternatives = grammar.alternatives(nonterminal)?;
    let expansion: &Expansion = alternatives.get(alternative_index)?;
    let children: Vec<DerivationTree> = expansion
        .iter()
        .map(|symbol| match symbol {
            Symbol::Nonterminal(name) => DerivationTree::open(ctx, name.clone()),
            Symbol::Terminal(text) => DerivationTree::terminal(ctx, text.clone()),
        })
        .collect();
    let expanded = DerivationTree::expanded(ctx, nonterminal.clone(), children);
    Some(tree.replace_at(path, expanded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::START_SYMBOL;

    fn digit_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<digit>")]);
        for d in '0'..='9' {
            g.add_production("<digit>", vec![Symbol::terminal(d.to_string())]);
        }
        g
    }

    #[test]
    fn path_precedes_orders_by_first_divergence() {
        let a = Path(vec![0, 1]);
        let b = Path(vec![0, 2]);
        assert!(a.precedes(&b));
        assert!(!b.precedes(&a));
    }

    #[test]
    fn path_precedes_treats_prefix_as_neither_before_nor_after() {
        let ancestor = Path(vec![0]);
        let descendant = Path(vec![0, 1]);
        assert!(!ancestor.precedes(&descendant));
        assert!(!descendant.precedes(&ancestor));
    }

    #[test]
    fn path_precedes_orders_diverging_siblings() {
        let earlier = Path(vec![0, 1]);
        let later = Path(vec![1, 0]);
        assert!(earlier.precedes(&later));
        assert!(!later.precedes(&earlier));
    }

    #[test]
    fn open_leaves_tracks_fresh_tree() {
        let mut ctx = Context::new();
        let tree = DerivationTree::open(&mut ctx, START_SYMBOL);
        let leaves = tree.open_leaves();
        assert_eq!(leaves.len(), 1);
        assert!(leaves[0].0.is_root());
    }

    #[test]
    fn expand_leaf_closes_one_open_position() {
        let mut ctx = Context::new();
        let grammar = digit_grammar();
        let root = DerivationTree::open(&mut ctx, START_SYMBOL);
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path::root(), 0).unwrap();
        assert_eq!(root.open_leaves().len(), 1);
        let digit_path = root.open_leaves()[0].0.clone();
        let root = expand_leaf(&mut ctx, &grammar, &root, &digit_path, 3).unwrap();
        assert!(root.is_closed());
        assert_eq!(root.to_source_string(), "3");
    }

    #[test]
    fn structural_hash_ignores_identity() {
        let mut ctx_a = Context::new();
        let mut ctx_b = Context::new();
        let a = DerivationTree::terminal(&mut ctx_a, "x");
        let b = DerivationTree::terminal(&mut ctx_b, "x");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.structural_hash(), b.structural_hash());
        assert_eq!(a, b);
    }

    #[test]
    fn replace_at_preserves_sibling_identity() {
        let mut ctx = Context::new();
        let grammar = digit_grammar();
        let root = DerivationTree::open(&mut ctx, START_SYMBOL);
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path::root(), 0).unwrap();
        let original_child_id = root.children()[0].id();
        let replacement = DerivationTree::terminal(&mut ctx, "9");
        let root2 = root.replace_at(&Path(vec![0]), replacement);
        assert_ne!(root2.children()[0].id(), original_child_id);
        assert_eq!(root2.id(), root.id());
    }
}
