//! The grammar data model (spec.md §3 "Grammar") and the reachability helper
//! that the match engine and tree-insertion rely on (spec.md §9 "Cyclic
//! graphs").
//!
//! Construction is programmatic only: the textual BNF reader is an external
//! collaborator (spec.md §1/§6) and is not implemented here.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// A single symbol on the right-hand side of a production: either a
/// nonterminal (conventionally written `<name>`) or a literal terminal.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Symbol {
    Nonterminal(String),
    Terminal(String),
}

impl Symbol {
    pub fn nonterminal(name: impl Into<String>) -> Self {
        Symbol::Nonterminal(name.into())
    }

    pub fn terminal(text: impl Into<String>) -> Self {
        Symbol::Terminal(text.into())
    }

    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Symbol::Nonterminal(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Symbol::Nonterminal(s) | Symbol::Terminal(s) => s,
        }
    }
}

/// One alternative in a production: an ordered sequence of symbols.
pub type Expansion = Vec<Symbol>;

pub const START_SYMBOL: &str = "<start>";

/// A context-free grammar, read-only once built: a mapping from nonterminal
/// name to its ordered list of alternatives.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Grammar {
    rules: BTreeMap<String, Vec<Expansion>>,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one alternative `nonterminal -> expansion` to the grammar.
    pub fn add_production(&mut self, nonterminal: impl Into<String>, expansion: Expansion) {
        self.rules.entry(nonterminal.into()).or_default().push(expansion);
    }

    pub fn alternatives(&self, nonterminal: &str) -> Option<&[Expansion]> {
        self.rules.get(nonterminal).map(Vec::as_slice)
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn contains(&self, nonterminal: &str) -> bool {
        self.rules.contains_key(nonterminal)
    }

    /// Well-formedness check (spec.md §4.2): every nonterminal mentioned on
    /// a right-hand side must itself have at least one production, and the
    /// start symbol must be defined.
    pub fn validate(&self) -> Result<(), String> {
        if !self.rules.contains_key(START_SYMBOL) {
            return Err(format!("grammar has no productions for {START_SYMBOL}"));
        }
        for (nonterminal, expansions) in &self.rules {
            if expansions.is_empty() {
                return Err(format!("nonterminal {nonterminal} has no alternatives"));
            }
            for expansion in expansions {
                for symbol in expansion {
                    if let Symbol::Nonterminal(name) = symbol {
                        if !self.rules.contains_key(name) {
                            return Err(format!(
                                "nonterminal {name} referenced in {nonterminal} is undefined"
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Build the direct-successor adjacency (nonterminal -> set of
    /// nonterminals appearing on the right-hand side of one of its rules).
    fn direct_successors(&self) -> HashMap<&str, HashSet<&str>> {
        let mut adj: HashMap<&str, HashSet<&str>> = HashMap::new();
        for (nonterminal, expansions) in &self.rules {
            let entry = adj.entry(nonterminal.as_str()).or_default();
            for expansion in expansions {
                for symbol in expansion {
                    if let Symbol::Nonterminal(name) = symbol {
                        entry.insert(name.as_str());
                    }
                }
            }
        }
        adj
    }

    /// Reachability cache: a precomputed transitive closure of the grammar's
    /// nonterminal graph, as recommended in spec.md §9. `reachable(a, b)` is
    /// true iff some string derivable from `a` could still reduce to one
    /// containing `b`.
    pub fn reachability(&self) -> Reachability {
        let adj = self.direct_successors();
        let mut closure: HashMap<String, HashSet<String>> = HashMap::new();
        for &from in adj.keys() {
            let mut seen = HashSet::new();
            let mut queue = VecDeque::new();
            queue.push_back(from);
            seen.insert(from);
            let mut reach = HashSet::new();
            while let Some(cur) = queue.pop_front() {
                if let Some(succs) = adj.get(cur) {
                    for &next in succs {
                        reach.insert(next.to_string());
                        if seen.insert(next) {
                            queue.push_back(next);
                        }
                    }
                }
            }
            closure.insert(from.to_string(), reach);
        }
        Reachability { closure }
    }
}

/// A precomputed, queryable transitive closure of a [`Grammar`]'s
/// nonterminal graph.
#[derive(Clone, Debug, Default)]
pub struct Reachability {
    closure: HashMap<String, HashSet<String>>,
}

impl Reachability {
    /// Is `to` reachable from `from` (in zero or more expansion steps)?
    /// A nonterminal is always considered reachable from itself.
    pub fn reachable(&self, from: &str, to: &str) -> bool {
        from == to || self.closure.get(from).is_some_and(|set| set.contains(to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang_grammar() -> Grammar {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<stmt>")]);
        g.add_production(
            "<stmt>",
            vec![
                Symbol::nonterminal("<assgn>"),
                Symbol::terminal(" ; "),
                Symbol::nonterminal("<stmt>"),
            ],
        );
        g.add_production("<stmt>", vec![Symbol::nonterminal("<assgn>")]);
        g.add_production(
            "<assgn>",
            vec![
                Symbol::nonterminal("<var>"),
                Symbol::terminal(" := "),
                Symbol::nonterminal("<rhs>"),
            ],
        );
        g.add_production("<rhs>", vec![Symbol::nonterminal("<var>")]);
        g.add_production("<rhs>", vec![Symbol::nonterminal("<digit>")]);
        for c in 'a'..='z' {
            g.add_production("<var>", vec![Symbol::terminal(c.to_string())]);
        }
        for d in '0'..='9' {
            g.add_production("<digit>", vec![Symbol::terminal(d.to_string())]);
        }
        g
    }

    #[test]
    fn validate_accepts_well_formed_grammar() {
        assert!(lang_grammar().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_start() {
        let mut g = Grammar::new();
        g.add_production("<a>", vec![Symbol::terminal("x")]);
        assert!(g.validate().is_err());
    }

    #[test]
    fn validate_rejects_dangling_nonterminal() {
        let mut g = Grammar::new();
        g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<missing>")]);
        assert!(g.validate().is_err());
    }

    #[test]
    fn reachability_is_transitive() {
        let g = lang_grammar();
        let reach = g.reachability();
        assert!(reach.reachable(START_SYMBOL, "<var>"));
        assert!(reach.reachable("<stmt>", "<digit>"));
        assert!(!reach.reachable("<var>", "<digit>"));
        assert!(reach.reachable("<var>", "<var>"));
    }
}
