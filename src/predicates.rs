//! Structural and semantic predicates (spec.md §4.4, §4.5).

use std::collections::HashMap;

use crate::context::Context;
use crate::formula::PredicateArg;
use crate::grammar::Grammar;
use crate::parser;
use crate::tree::{DerivationTree, Path};
use crate::variable::Variable;

/// The outcome of evaluating a semantic predicate (spec.md §4.5): decided
/// true/false, not yet decidable given the current tree (`Unready`), or
/// decidable by applying a substitution to the state (`Substitute`).
#[derive(Clone, Debug)]
pub enum SemPredResult {
    True,
    False,
    Unready,
    Substitute(HashMap<Variable, DerivationTree>),
}

/// Resolve a predicate argument to the concrete tree it currently denotes,
/// given the ambient tree's own root (used to resolve the goal constant)
/// and a binding environment for other variables.
fn resolve_tree<'a>(
    arg: &'a PredicateArg,
    goal: &'a DerivationTree,
    bindings: &'a HashMap<Variable, DerivationTree>,
) -> Option<&'a DerivationTree> {
    match arg {
        PredicateArg::Tree(t) => Some(t),
        PredicateArg::Var(v) if *v == Variable::goal() => Some(goal),
        PredicateArg::Var(v) => bindings.get(v),
        PredicateArg::Literal(_) => None,
    }
}

/// Structural predicates (spec.md §4.4): pure, total functions of the
/// *paths* of their arguments inside `ambient`.
pub fn eval_structural(
    name: &str,
    ambient: &DerivationTree,
    paths: &[Path],
    literal_arg: Option<&str>,
) -> Result<bool, String> {
    match (name, paths) {
        ("before", [p, q]) => Ok(p != q && p.precedes(q)),
        ("after", [p, q]) => Ok(p != q && q.precedes(p)),
        ("same_position", [p, q]) => Ok(p == q),
        ("different_position", [p, q]) => Ok(p != q),
        ("level", [p, q]) => {
            let kind = literal_arg.ok_or_else(|| "level requires a 'kind' literal argument".to_string())?;
            Ok(nearest_ancestor_of_kind(ambient, p, kind) == nearest_ancestor_of_kind(ambient, q, kind))
        }
        _ => Err(format!("unknown structural predicate '{name}'")),
    }
}

/// The longest prefix of `path` whose addressed node has symbol `kind`,
/// i.e. the nearest enclosing node of that kind (spec.md §4.4 `level`,
/// "same block/scope level").
fn nearest_ancestor_of_kind(tree: &DerivationTree, path: &Path, kind: &str) -> Option<Path> {
    let mut candidate = path.clone();
    loop {
        if let Some(node) = tree.at(&candidate) {
            if node.symbol() == kind {
                return Some(candidate);
            }
        }
        candidate = candidate.parent()?;
    }
}

/// `count(t, nt, n)`: count occurrences of nonterminal `nt` within tree
/// `t` (spec.md §4.5). `n` is either the numeric goal constant (propose a
/// substitution binding it to the count) or an already-bound numeric tree
/// (compare).
pub fn eval_count(
    ctx: &mut Context,
    grammar: &Grammar,
    t: &DerivationTree,
    t_var: &Variable,
    nonterminal: &str,
    n_arg: &PredicateArg,
    n_var: &Variable,
    bindings: &HashMap<Variable, DerivationTree>,
) -> SemPredResult {
    let actual = count_occurrences(t, nonterminal);
    let still_open = !t.is_closed();
    let reachability = grammar.reachability();
    let could_grow = t.open_leaves().iter().any(|(_, leaf)| reachability.reachable(leaf.symbol(), nonterminal));

    match resolve_tree(n_arg, t, bindings) {
        Some(bound) if bound.is_closed() => {
            match bound.to_source_string().parse::<usize>() {
                Ok(expected) if expected == actual => SemPredResult::True,
                Ok(expected) if expected > actual => {
                    // §9's open question ("report unready instead of false
                    // when count fails to find an insertion") is fixed here
                    // as `false`: a failed bounded search is a local dead
                    // end, not a reason to keep the branch alive.
                    match grow_to_count(ctx, grammar, t, nonterminal, expected) {
                        Some(grown) => {
                            let mut out = HashMap::new();
                            out.insert(t_var.clone(), grown);
                            SemPredResult::Substitute(out)
                        }
                        None => SemPredResult::False,
                    }
                }
                Ok(_) => SemPredResult::False,
                Err(_) => SemPredResult::False,
            }
        }
        Some(_) => SemPredResult::Unready,
        None => {
            // `n` is the free numeric goal: unready while more `nt`
            // occurrences could still appear, otherwise propose the count.
            if could_grow {
                SemPredResult::Unready
            } else if !still_open {
                let leaf = DerivationTree::from_terminal_production(ctx, crate::variable::NUM_TYPE, actual.to_string());
                let mut out = HashMap::new();
                out.insert(n_var.clone(), leaf);
                SemPredResult::Substitute(out)
            } else {
                SemPredResult::Unready
            }
        }
    }
}

/// The most candidate trees `grow_to_count` will consider at each step
/// before giving up, bounding the search breadth (spec.md §4.5, §4.8).
const MAX_GROWTH_CANDIDATES: usize = 64;

/// Attempt bounded tree-insertion of additional `nonterminal` occurrences
/// into `tree` until a candidate's count lands exactly on `target`
/// (spec.md §8 scenario 4; grounded in the original `count()`'s
/// unconditional `insert_tree` attempt when under target). One fresh,
/// still-open occurrence is inserted per step; `target - actual` such
/// steps are needed since every insertion raises the count by exactly
/// one. Breadth-first over candidates at each step, first hit wins.
fn grow_to_count(
    ctx: &mut Context,
    grammar: &Grammar,
    tree: &DerivationTree,
    nonterminal: &str,
    target: usize,
) -> Option<DerivationTree> {
    let mut frontier: Vec<DerivationTree> = vec![tree.clone()];
    while !frontier.is_empty() {
        if let Some(hit) = frontier.iter().find(|candidate| count_occurrences(candidate, nonterminal) == target) {
            return Some(hit.clone());
        }
        let under_target: Vec<&DerivationTree> =
            frontier.iter().filter(|candidate| count_occurrences(candidate, nonterminal) < target).collect();
        let mut next = Vec::new();
        'frontier: for candidate in under_target {
            for grown in crate::insertion::insert_nonterminal(ctx, grammar, candidate, nonterminal) {
                next.push(grown);
                if next.len() >= MAX_GROWTH_CANDIDATES {
                    break 'frontier;
                }
            }
        }
        frontier = next;
    }
    None
}

fn count_occurrences(tree: &DerivationTree, nonterminal: &str) -> usize {
    let mut total = if tree.symbol() == nonterminal { 1 } else { 0 };
    for child in tree.children() {
        total += count_occurrences(child, nonterminal);
    }
    total
}

/// `crop(t, w)`: constrain `t`'s string image to at most `w` characters,
/// substituting a reparsed, truncated tree when `t` is over width.
pub fn eval_crop(
    ctx: &mut Context,
    grammar: &Grammar,
    t: &DerivationTree,
    t_var: &Variable,
    width: usize,
) -> SemPredResult {
    if !t.is_closed() {
        return SemPredResult::Unready;
    }
    let image = t.to_source_string();
    if image.chars().count() <= width {
        return SemPredResult::True;
    }
    let cropped: String = image.chars().take(width).collect();
    match parser::parse(grammar, ctx, t.symbol(), &cropped) {
        Some(reparsed) => {
            let mut out = HashMap::new();
            out.insert(t_var.clone(), reparsed);
            SemPredResult::Substitute(out)
        }
        None => SemPredResult::False,
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Justify {
    Left,
    Right,
}

/// `ljust(t, w, c)` / `rjust(t, w, c)`: pad `t`'s string image to width `w`
/// with fill character `c` on the opposite side of the justification; the
/// `_crop` variants additionally truncate an over-width tree instead of
/// failing (spec.md §4.5).
pub fn eval_justify(
    ctx: &mut Context,
    grammar: &Grammar,
    t: &DerivationTree,
    t_var: &Variable,
    width: usize,
    fill: char,
    side: Justify,
    allow_crop: bool,
) -> SemPredResult {
    if !t.is_closed() {
        return SemPredResult::Unready;
    }
    let image = t.to_source_string();
    let len = image.chars().count();
    if len == width {
        return SemPredResult::True;
    }
    let adjusted = if len < width {
        let pad: String = std::iter::repeat(fill).take(width - len).collect();
        match side {
            Justify::Left => format!("{image}{pad}"),
            Justify::Right => format!("{pad}{image}"),
        }
    } else if allow_crop {
        match side {
            Justify::Left => image.chars().take(width).collect(),
            Justify::Right => image.chars().skip(len - width).collect(),
        }
    } else {
        return SemPredResult::False;
    };
    match parser::parse(grammar, ctx, t.symbol(), &adjusted) {
        Some(reparsed) => {
            let mut out = HashMap::new();
            out.insert(t_var.clone(), reparsed);
            SemPredResult::Substitute(out)
        }
        None => SemPredResult::False,
    }
}

/// `octal_to_decimal(o, d)`: bidirectional numeric-base conversion.
/// Whichever side is still a free numeric constant gets substituted from
/// the other, already-concrete side.
pub fn eval_octal_to_decimal(
    ctx: &mut Context,
    octal_tree: Option<&DerivationTree>,
    octal_var: &Variable,
    octal_nonterminal: &str,
    decimal_tree: Option<&DerivationTree>,
    decimal_var: &Variable,
    decimal_nonterminal: &str,
) -> SemPredResult {
    match (octal_tree, decimal_tree) {
        (Some(o), Some(d)) if o.is_closed() && d.is_closed() => {
            match (u64::from_str_radix(&o.to_source_string(), 8), d.to_source_string().parse::<u64>()) {
                (Ok(o_val), Ok(d_val)) if o_val == d_val => SemPredResult::True,
                (Ok(_), Ok(_)) => SemPredResult::False,
                _ => SemPredResult::False,
            }
        }
        (Some(o), None) if o.is_closed() => match u64::from_str_radix(&o.to_source_string(), 8) {
            Ok(value) => {
                let leaf = DerivationTree::from_terminal_production(ctx, decimal_nonterminal, value.to_string());
                let mut out = HashMap::new();
                out.insert(decimal_var.clone(), leaf);
                SemPredResult::Substitute(out)
            }
            Err(_) => SemPredResult::False,
        },
        (None, Some(d)) if d.is_closed() => match d.to_source_string().parse::<u64>() {
            Ok(value) => {
                let leaf = DerivationTree::from_terminal_production(ctx, octal_nonterminal, format!("{value:o}"));
                let mut out = HashMap::new();
                out.insert(octal_var.clone(), leaf);
                SemPredResult::Substitute(out)
            }
            Err(_) => SemPredResult::False,
        },
        _ => SemPredResult::Unready,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{START_SYMBOL, Symbol};
    use crate::tree::expand_leaf;

    #[test]
    fn before_and_after_are_consistent() {
        let mut ctx = Context::new();
        let tree = DerivationTree::terminal(&mut ctx, "x");
        let p = Path(vec![0]);
        let q = Path(vec![1]);
        assert!(eval_structural("before", &tree, &[p.clone(), q.clone()], None).unwrap());
        assert!(eval_structural("after", &tree, &[q, p], None).unwrap());
    }

    #[test]
    fn same_position_and_different_position_are_complementary() {
        let mut ctx = Context::new();
        let tree = DerivationTree::terminal(&mut ctx, "x");
        let p = Path(vec![0, 1]);
        assert!(eval_structural("same_position", &tree, &[p.clone(), p.clone()], None).unwrap());
        assert!(!eval_structural("different_position", &tree, &[p.clone(), p], None).unwrap());
    }

    fn digit_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<digits>")]);
        g.add_production(
            "<digits>",
            vec![Symbol::nonterminal("<digit>"), Symbol::nonterminal("<digits>")],
        );
        g.add_production("<digits>", vec![Symbol::nonterminal("<digit>")]);
        for d in '0'..='9' {
            g.add_production("<digit>", vec![Symbol::terminal(d.to_string())]);
        }
        g
    }

    #[test]
    fn count_proposes_substitution_once_closed() {
        let mut ctx = Context::new();
        let grammar = digit_grammar();
        let root = DerivationTree::open(&mut ctx, START_SYMBOL);
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path::root(), 0).unwrap();
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path(vec![0]), 1).unwrap();
        let digits_path = root.open_leaves()[0].0.clone();
        let root = expand_leaf(&mut ctx, &grammar, &root, &digits_path, 0).unwrap();
        let root = expand_leaf(&mut ctx, &grammar, &root, &Path(vec![0, 0]), 3).unwrap();
        assert!(root.is_closed());

        let n_var = Variable::constant("n", crate::variable::NUM_TYPE);
        let result = eval_count(
            &mut ctx,
            &grammar,
            &root,
            &Variable::goal(),
            "<digit>",
            &PredicateArg::Var(n_var.clone()),
            &n_var,
            &HashMap::new(),
        );
        match result {
            SemPredResult::Substitute(map) => {
                assert_eq!(map.get(&n_var).unwrap().to_source_string(), "1");
            }
            other => panic!("expected Substitute, got {other:?}"),
        }
    }

    #[test]
    fn justify_pads_short_string() {
        let mut ctx = Context::new();
        let grammar = digit_grammar();
        let tree = DerivationTree::from_terminal_production(&mut ctx, "<digit>", "3");
        let t_var = Variable::bound("t", "<digit>");
        let result = eval_justify(&mut ctx, &grammar, &tree, &t_var, 1, '0', Justify::Right, false);
        assert!(matches!(result, SemPredResult::True));
    }

    #[test]
    fn octal_to_decimal_converts_when_octal_known() {
        let mut ctx = Context::new();
        let octal = DerivationTree::from_terminal_production(&mut ctx, "<octal>", "17");
        let o_var = Variable::bound("o", "<octal>");
        let d_var = Variable::bound("d", "<decimal>");
        let result = eval_octal_to_decimal(&mut ctx, Some(&octal), &o_var, "<octal>", None, &d_var, "<decimal>");
        match result {
            SemPredResult::Substitute(map) => assert_eq!(map.get(&d_var).unwrap().to_source_string(), "15"),
            other => panic!("expected Substitute, got {other:?}"),
        }
    }
}
