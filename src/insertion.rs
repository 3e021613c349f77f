//! Tree insertion / embedding (spec.md §4.8): producing new trees that
//! contain a subtree matching a bind expression's shape, either by filling
//! a compatible open leaf or by wrapping existing content through a
//! self-recursive nonterminal.

use std::collections::{HashMap, HashSet};

use crate::context::Context;
use crate::grammar::{Grammar, Symbol};
use crate::tree::{DerivationTree, Path, expand_leaf};
use crate::variable::{BindElement, BindExpression};

/// Build a fresh, unattached tree rooted at `nonterminal` whose top-level
/// shape matches `bind`: one grammar alternative of `nonterminal` whose
/// symbol kinds line up element-for-element with `bind`'s variables and
/// literals. Each matched variable position becomes a fresh open leaf of
/// its declared nonterminal; literal positions become terminal leaves.
pub fn build_shape(ctx: &mut Context, grammar: &Grammar, nonterminal: &str, bind: &BindExpression) -> Option<DerivationTree> {
    let alternatives = grammar.alternatives(nonterminal)?;
    let elements = bind.elements();
    'alt: for alternative in alternatives {
        if alternative.len() != elements.len() {
            continue;
        }
        let mut children = Vec::with_capacity(elements.len());
        for (symbol, element) in alternative.iter().zip(elements.iter()) {
            match (symbol, element) {
                (Symbol::Terminal(text), BindElement::Literal(expected)) if text == expected => {
                    children.push(DerivationTree::terminal(ctx, text.clone()));
                }
                (Symbol::Nonterminal(name), BindElement::Var(var)) if name == var.nonterminal() => {
                    children.push(DerivationTree::open(ctx, name.clone()));
                }
                _ => continue 'alt,
            }
        }
        return Some(DerivationTree::expanded(ctx, nonterminal, children));
    }
    None
}

/// One grammar-expansion step on the way from one nonterminal down toward
/// another: `(nonterminal expanded, alternative chosen, child position to
/// follow next)`.
type ChainStep = (String, usize, usize);

/// Shortest sequence of expansion steps turning an open leaf of `from`
/// into a tree with an open leaf of `to` somewhere beneath it (spec.md
/// §4.8 "possibly via several grammar steps"). Empty when `from == to`.
fn find_chain(grammar: &Grammar, from: &str, to: &str) -> Option<Vec<ChainStep>> {
    if from == to {
        return Some(Vec::new());
    }
    let mut visited = HashSet::new();
    visited.insert(from.to_string());
    let mut queue = std::collections::VecDeque::new();
    queue.push_back((from.to_string(), Vec::<ChainStep>::new()));
    while let Some((current, path)) = queue.pop_front() {
        let Some(alternatives) = grammar.alternatives(&current) else { continue };
        for (alt_index, alternative) in alternatives.iter().enumerate() {
            for (pos, symbol) in alternative.iter().enumerate() {
                if let Symbol::Nonterminal(name) = symbol {
                    if name == to {
                        let mut full = path.clone();
                        full.push((current.clone(), alt_index, pos));
                        return Some(full);
                    }
                    if visited.insert(name.clone()) {
                        let mut next_path = path.clone();
                        next_path.push((current.clone(), alt_index, pos));
                        queue.push_back((name.clone(), next_path));
                    }
                }
            }
        }
    }
    None
}

/// Apply a chain found by [`find_chain`] starting at `path`, returning the
/// updated tree and the path of the open leaf the chain terminates at.
fn apply_chain(
    ctx: &mut Context,
    grammar: &Grammar,
    tree: &DerivationTree,
    path: &Path,
    chain: &[ChainStep],
) -> Option<(DerivationTree, Path)> {
    let mut tree = tree.clone();
    let mut current = path.clone();
    for (_, alt_index, pos) in chain {
        tree = expand_leaf(ctx, grammar, &tree, &current, *alt_index)?;
        current = current.child(*pos);
    }
    Some((tree, current))
}

/// Strategy (i)'s reachable positions: every open leaf of `tree` whose
/// nonterminal can reach `nonterminal`, expanded down to that nonterminal,
/// paired with the path of the resulting (still open) `nonterminal` leaf.
fn reach_by_filling(ctx: &mut Context, grammar: &Grammar, tree: &DerivationTree, nonterminal: &str) -> Vec<(DerivationTree, Path)> {
    let mut out = Vec::new();
    for (leaf_path, leaf) in tree.open_leaves() {
        let Some(chain) = find_chain(grammar, leaf.symbol(), nonterminal) else { continue };
        if let Some(result) = apply_chain(ctx, grammar, tree, &leaf_path, &chain) {
            out.push(result);
        }
    }
    out
}

/// Strategy (ii)'s reachable positions: for every node whose own
/// nonterminal has a self-recursive alternative (one that mentions
/// itself) with another symbol able to reach `nonterminal`, rebuild that
/// node so the existing subtree becomes the recursive child and a fresh
/// sibling is grown toward `nonterminal`, paired with the path of the
/// resulting (still open) `nonterminal` leaf.
fn reach_by_wrapping(ctx: &mut Context, grammar: &Grammar, tree: &DerivationTree, nonterminal: &str) -> Vec<(DerivationTree, Path)> {
    let mut out = Vec::new();
    let mut positions = Vec::new();
    collect_all_paths(tree, Path::root(), &mut positions);

    for path in positions {
        let Some(node) = tree.at(&path) else { continue };
        let nt = node.symbol().to_string();
        let Some(alternatives) = grammar.alternatives(&nt) else { continue };
        for alternative in alternatives {
            let self_positions: Vec<usize> = alternative
                .iter()
                .enumerate()
                .filter_map(|(i, s)| matches!(s, Symbol::Nonterminal(n) if n == &nt).then_some(i))
                .collect();
            let Some(&self_pos) = self_positions.first() else { continue };

            for (sibling_pos, sibling_symbol) in alternative.iter().enumerate() {
                if sibling_pos == self_pos {
                    continue;
                }
                let Symbol::Nonterminal(sibling_nt) = sibling_symbol else { continue };
                let Some(chain) = find_chain(grammar, sibling_nt, nonterminal) else { continue };

                let mut children = Vec::with_capacity(alternative.len());
                for (i, symbol) in alternative.iter().enumerate() {
                    if i == self_pos {
                        children.push(node.clone());
                    } else {
                        match symbol {
                            Symbol::Nonterminal(name) => children.push(DerivationTree::open(ctx, name.clone())),
                            Symbol::Terminal(text) => children.push(DerivationTree::terminal(ctx, text.clone())),
                        }
                    }
                }
                let wrapped = DerivationTree::expanded(ctx, nt.clone(), children);
                let replaced = tree.replace_at(&path, wrapped);
                let sibling_path = path.child(sibling_pos);
                if let Some(result) = apply_chain(ctx, grammar, &replaced, &sibling_path, &chain) {
                    out.push(result);
                }
            }
        }
    }
    out
}

fn collect_all_paths(tree: &DerivationTree, here: Path, out: &mut Vec<Path>) {
    out.push(here.clone());
    for (i, child) in tree.children().iter().enumerate() {
        collect_all_paths(child, here.child(i), out);
    }
}

/// Strategy (i): fill a compatible open leaf with a tree matching `bind`.
pub fn insert_by_filling(
    ctx: &mut Context,
    grammar: &Grammar,
    tree: &DerivationTree,
    nonterminal: &str,
    bind: &BindExpression,
) -> Vec<DerivationTree> {
    let mut out = Vec::new();
    let mut seen_hashes = HashSet::new();
    for (expanded_tree, target_path) in reach_by_filling(ctx, grammar, tree, nonterminal) {
        let Some(shape) = build_shape(ctx, grammar, nonterminal, bind) else { continue };
        let result = expanded_tree.replace_at(&target_path, shape);
        let hash = result.structural_hash();
        if seen_hashes.insert(hash) {
            out.push(result);
        }
    }
    out
}

/// Strategy (ii): wrap existing content, grafting a tree matching `bind`
/// onto the freshly grown sibling.
pub fn insert_by_wrapping(
    ctx: &mut Context,
    grammar: &Grammar,
    tree: &DerivationTree,
    nonterminal: &str,
    bind: &BindExpression,
) -> Vec<DerivationTree> {
    let mut out = Vec::new();
    let mut seen_hashes = HashSet::new();
    for (expanded_tree, target_path) in reach_by_wrapping(ctx, grammar, tree, nonterminal) {
        let Some(shape) = build_shape(ctx, grammar, nonterminal, bind) else { continue };
        let result = expanded_tree.replace_at(&target_path, shape);
        let hash = result.structural_hash();
        if seen_hashes.insert(hash) {
            out.push(result);
        }
    }
    out
}

/// All embeddings of `bind`'s shape rooted at `nonterminal` into `tree`,
/// deduplicated by structural hash (spec.md §4.8).
pub fn embed(
    ctx: &mut Context,
    grammar: &Grammar,
    tree: &DerivationTree,
    nonterminal: &str,
    bind: &BindExpression,
) -> Vec<DerivationTree> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in insert_by_filling(ctx, grammar, tree, nonterminal, bind)
        .into_iter()
        .chain(insert_by_wrapping(ctx, grammar, tree, nonterminal, bind))
    {
        if seen.insert(candidate.structural_hash()) {
            out.push(candidate);
        }
    }
    out
}

/// Insert one fresh, still-open occurrence of `nonterminal` into `tree`,
/// via either strategy, without committing to any shape for the new node
/// (spec.md §4.8). Used by `count` to grow a tree toward a target
/// occurrence count one node at a time.
pub fn insert_nonterminal(ctx: &mut Context, grammar: &Grammar, tree: &DerivationTree, nonterminal: &str) -> Vec<DerivationTree> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for (candidate, _target_path) in reach_by_filling(ctx, grammar, tree, nonterminal)
        .into_iter()
        .chain(reach_by_wrapping(ctx, grammar, tree, nonterminal))
    {
        if seen.insert(candidate.structural_hash()) {
            out.push(candidate);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::START_SYMBOL;
    use crate::variable::Variable;

    fn stmt_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<stmt>")]);
        g.add_production(
            "<stmt>",
            vec![Symbol::nonterminal("<assgn>"), Symbol::terminal(" ; "), Symbol::nonterminal("<stmt>")],
        );
        g.add_production("<stmt>", vec![Symbol::nonterminal("<assgn>")]);
        g.add_production(
            "<assgn>",
            vec![Symbol::nonterminal("<var>"), Symbol::terminal(" := "), Symbol::nonterminal("<rhs>")],
        );
        g.add_production("<rhs>", vec![Symbol::nonterminal("<var>")]);
        g.add_production("<var>", vec![Symbol::terminal("x")]);
        g.add_production("<var>", vec![Symbol::terminal("y")]);
        g
    }

    fn assgn_bind() -> BindExpression {
        BindExpression::new(vec![
            BindElement::Var(Variable::bound("lhs", "<var>")),
            BindElement::Literal(" := ".to_string()),
            BindElement::Var(Variable::bound("rhs", "<rhs>")),
        ])
    }

    #[test]
    fn build_shape_matches_known_alternative() {
        let mut ctx = Context::new();
        let grammar = stmt_grammar();
        let tree = build_shape(&mut ctx, &grammar, "<assgn>", &assgn_bind()).unwrap();
        assert_eq!(tree.children().len(), 3);
        assert_eq!(tree.children()[1].symbol(), " := ");
    }

    #[test]
    fn insert_by_filling_grafts_into_open_leaf() {
        let mut ctx = Context::new();
        let grammar = stmt_grammar();
        let tree = DerivationTree::open(&mut ctx, START_SYMBOL);
        let results = insert_by_filling(&mut ctx, &grammar, &tree, "<assgn>", &assgn_bind());
        assert!(!results.is_empty());
        assert!(results[0].open_leaves().iter().any(|(_, l)| l.symbol() == "<var>"));
    }

    #[test]
    fn insert_by_wrapping_uses_self_recursive_alternative() {
        let mut ctx = Context::new();
        let grammar = stmt_grammar();
        let root = DerivationTree::open(&mut ctx, "<stmt>");
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path::root(), 1).unwrap();
        let results = insert_by_wrapping(&mut ctx, &grammar, &root, "<assgn>", &assgn_bind());
        assert!(!results.is_empty());
    }

    #[test]
    fn embed_deduplicates_by_structural_hash() {
        let mut ctx = Context::new();
        let grammar = stmt_grammar();
        let tree = DerivationTree::open(&mut ctx, START_SYMBOL);
        let results = embed(&mut ctx, &grammar, &tree, "<assgn>", &assgn_bind());
        let mut hashes: Vec<u64> = results.iter().map(DerivationTree::structural_hash).collect();
        hashes.sort_unstable();
        let before_len = hashes.len();
        hashes.dedup();
        assert_eq!(hashes.len(), before_len);
    }
}
