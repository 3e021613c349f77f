//! Parses a literal string into a [`DerivationTree`] rooted at a chosen
//! nonterminal, against a [`Grammar`].
//!
//! This is the "tree-aware instantiation" step the SMT bridge needs
//! (reparsing a model string, or a semantic predicate like `crop` needs
//! (reparsing a padded/cropped string) — not the external BNF-text-to-
//! [`Grammar`] reader, which stays out of this crate.

use std::collections::{HashMap, HashSet};

use crate::context::Context;
use crate::grammar::{Grammar, Symbol};
use crate::tree::DerivationTree;

type Memo = HashMap<(String, usize, usize), Option<DerivationTree>>;

/// Parse `text` as a derivation of `nonterminal` under `grammar`. Returns
/// the first matching parse tree found, or `None` if `text` is not in the
/// language of `nonterminal`.
pub fn parse(grammar: &Grammar, ctx: &mut Context, nonterminal: &str, text: &str) -> Option<DerivationTree> {
    let chars: Vec<char> = text.chars().collect();
    let mut memo = Memo::new();
    let mut in_progress = HashSet::new();
    parse_nonterminal(grammar, ctx, &chars, nonterminal, 0, chars.len(), &mut memo, &mut in_progress)
}

fn parse_nonterminal(
    grammar: &Grammar,
    ctx: &mut Context,
    chars: &[char],
    nonterminal: &str,
    start: usize,
    end: usize,
    memo: &mut Memo,
    in_progress: &mut HashSet<(String, usize, usize)>,
) -> Option<DerivationTree> {
    let key = (nonterminal.to_string(), start, end);
    if let Some(cached) = memo.get(&key) {
        return cached.clone();
    }
    // Cycle guard: a nonterminal already being matched against the same
    // span is assumed unsatisfiable by that path (rules out infinite
    // recursion through epsilon-like productions).
    if in_progress.contains(&key) {
        return None;
    }
    in_progress.insert(key.clone());

    let mut result = None;
    if let Some(alternatives) = grammar.alternatives(nonterminal) {
        for alternative in alternatives {
            if let Some(children) =
                parse_sequence(grammar, ctx, chars, alternative, start, end, memo, in_progress)
            {
                result = Some(DerivationTree::expanded(ctx, nonterminal, children));
                break;
            }
        }
    }

    in_progress.remove(&key);
    memo.insert(key, result.clone());
    result
}

fn parse_sequence(
    grammar: &Grammar,
    ctx: &mut Context,
    chars: &[char],
    symbols: &[Symbol],
    start: usize,
    end: usize,
    memo: &mut Memo,
    in_progress: &mut HashSet<(String, usize, usize)>,
) -> Option<Vec<DerivationTree>> {
    let Some((first, rest)) = symbols.split_first() else {
        return if start == end { Some(Vec::new()) } else { None };
    };
    match first {
        Symbol::Terminal(text) => {
            let literal: Vec<char> = text.chars().collect();
            let literal_end = start + literal.len();
            if literal_end > end || chars[start..literal_end] != literal[..] {
                return None;
            }
            let tail = parse_sequence(grammar, ctx, chars, rest, literal_end, end, memo, in_progress)?;
            let leaf = DerivationTree::terminal(ctx, text.clone());
            let mut children = Vec::with_capacity(tail.len() + 1);
            children.push(leaf);
            children.extend(tail);
            Some(children)
        }
        Symbol::Nonterminal(name) => {
            for split in start..=end {
                if let Some(subtree) =
                    parse_nonterminal(grammar, ctx, chars, name, start, split, memo, in_progress)
                {
                    if let Some(tail) = parse_sequence(grammar, ctx, chars, rest, split, end, memo, in_progress) {
                        let mut children = Vec::with_capacity(tail.len() + 1);
                        children.push(subtree);
                        children.extend(tail);
                        return Some(children);
                    }
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{START_SYMBOL, Symbol};

    fn digit_list_grammar() -> Grammar {
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
    fn parses_matching_string() {
        let mut ctx = Context::new();
        let grammar = digit_list_grammar();
        let tree = parse(&grammar, &mut ctx, START_SYMBOL, "123").unwrap();
        assert_eq!(tree.to_source_string(), "123");
        assert!(tree.is_closed());
    }

    #[test]
    fn rejects_non_matching_string() {
        let mut ctx = Context::new();
        let grammar = digit_list_grammar();
        assert!(parse(&grammar, &mut ctx, START_SYMBOL, "12a").is_none());
    }

    #[test]
    fn rejects_empty_string_for_nonnullable_grammar() {
        let mut ctx = Context::new();
        let grammar = digit_list_grammar();
        assert!(parse(&grammar, &mut ctx, START_SYMBOL, "").is_none());
    }
}
