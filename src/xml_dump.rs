//! Debug XML serialization of a [`SolutionState`] (spec.md "[ADDED]
//! tooling / debug dump"): a human-readable snapshot of the tree, its
//! remaining formula, and its queue cost, useful when stepping through a
//! search by hand.

use std::fmt::Write as _;

use crate::formula::Formula;
use crate::tree::{DerivationTree, NodeValue};

/// Escape the handful of characters that are illegal or meaningful inside
/// XML text content: the standard five entities, plus the control
/// characters that a raw derivation-tree terminal could plausibly contain
/// (NUL, vertical tab, form feed).
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\0' => out.push_str("&#0;"),
            '\u{b}' => out.push_str("&#11;"),
            '\u{c}' => out.push_str("&#12;"),
            other => out.push(other),
        }
    }
    out
}

fn tree_to_xml(tree: &DerivationTree, out: &mut String) {
    match tree.value() {
        NodeValue::Open(nt) => {
            let _ = write!(out, "<open id=\"{}\" symbol=\"{}\"/>", tree.id(), escape(nt));
        }
        NodeValue::Terminal(text) => {
            let _ = write!(out, "<terminal id=\"{}\">{}</terminal>", tree.id(), escape(text));
        }
        NodeValue::Expanded(nt, children) => {
            let _ = write!(out, "<node id=\"{}\" symbol=\"{}\">", tree.id(), escape(nt));
            for child in children {
                tree_to_xml(child, out);
            }
            out.push_str("</node>");
        }
    }
}

/// Render one search state as a self-contained XML document.
pub fn state_to_xml(tree: &DerivationTree, formula: &Formula, cost: f64, hash: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<state cost=\"{cost}\" hash=\"{hash}\">");
    let _ = writeln!(out, "  <constraint>{}</constraint>", escape(&format!("{formula:?}")));
    out.push_str("  ");
    tree_to_xml(tree, &mut out);
    out.push('\n');
    out.push_str("</state>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape("a\0b"), "a&#0;b");
        assert_eq!(escape("<x>"), "&lt;x&gt;");
    }

    #[test]
    fn renders_a_closed_terminal_tree() {
        let mut ctx = Context::new();
        let tree = DerivationTree::from_terminal_production(&mut ctx, "<var>", "x");
        let xml = state_to_xml(&tree, &Formula::True, 0.0, tree.structural_hash());
        assert!(xml.contains("<node"));
        assert!(xml.contains("<terminal"));
    }
}
