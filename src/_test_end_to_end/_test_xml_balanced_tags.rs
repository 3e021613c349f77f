//! Scenario 3 (spec.md §8): a grammar of nested tags; constraint: for
//! every tagged subtree, its opening and closing identifier strings are
//! equal. Every emission must parse as well-formed, tag-matched markup.

use crate::builders::{dummy, forall_bind, bind, bind_lit, bind_var, smt, var_term};
use crate::context::Context;
use crate::grammar::{Grammar, Symbol, START_SYMBOL};
use crate::smt::EnumeratingBackend;
use crate::solver::{self, SolverOptions};
use crate::variable::Variable;

/// `<element>→"<" <name> ">" <content> "</" <name> ">"`, `<content>→<element> | ""`,
/// `<name>→"a" | "b"` — tags may nest one level deep, or be empty.
fn tag_grammar() -> Grammar {
    let mut g = Grammar::new();
    g.add_production(START_SYMBOL, vec![Symbol::nonterminal("<element>")]);
    g.add_production(
        "<element>",
        vec![
            Symbol::terminal("<"),
            Symbol::nonterminal("<name>"),
            Symbol::terminal(">"),
            Symbol::nonterminal("<content>"),
            Symbol::terminal("</"),
            Symbol::nonterminal("<name>"),
            Symbol::terminal(">"),
        ],
    );
    g.add_production("<content>", vec![Symbol::nonterminal("<element>")]);
    g.add_production("<content>", vec![]);
    g.add_production("<name>", vec![Symbol::terminal("a")]);
    g.add_production("<name>", vec![Symbol::terminal("b")]);
    g
}

/// `forall <element> e=("<",open,">",_,"</",close,">") in start: open = close`.
fn balanced_tags_formula(ctx: &mut Context) -> crate::formula::Formula {
    let goal = Variable::goal();
    let e = Variable::bound("e", "<element>");
    let open = Variable::bound("open", "<name>");
    let close = Variable::bound("close", "<name>");
    let body = dummy(ctx, "<content>");
    let shape = bind(vec![
        bind_lit("<"),
        bind_var(&open),
        bind_lit(">"),
        bind_var(&body),
        bind_lit("</"),
        bind_var(&close),
        bind_lit(">"),
    ]);
    forall_bind(e, shape, &goal, smt("=", vec![var_term(&open), var_term(&close)]))
}

/// Checks that `text` is well-formed markup over this grammar's tag shape:
/// every `<x>` is immediately matched by a `</x>` for the same `x`,
/// possibly around one nested `<y>...</y>` (or nothing) in between.
fn assert_tags_match(text: &str) {
    assert!(text.starts_with('<') && !text.starts_with("</"), "`{text}` must open with a tag");
    let open_name = &text[1..2];
    assert_eq!(&text[2..3], ">", "`{text}` must close the opening tag's `>`");
    let rest = &text[3..];
    if let Some(inner) = rest.strip_prefix('<') {
        // one nested element: recurse on it, then check the remaining closer.
        let inner_with_bracket = format!("<{inner}");
        let close_marker = "</";
        let split = inner_with_bracket.find(close_marker).expect("nested element must close");
        let (nested, tail) = inner_with_bracket.split_at(split);
        assert_tags_match(nested);
        assert_eq!(&tail[close_marker.len()..close_marker.len() + 1], open_name, "`{text}` closer must match opener `{open_name}`");
    } else {
        // empty content: immediately the closing tag.
        assert!(rest.starts_with("</"), "`{text}` must close immediately when empty");
        assert_eq!(&rest[2..3], open_name, "`{text}` closer must match opener `{open_name}`");
    }
}

#[test]
fn every_emission_has_matching_open_and_close_tags() {
    let mut ctx = Context::new();
    let grammar = tag_grammar();
    let formula = balanced_tags_formula(&mut ctx);
    let backend = EnumeratingBackend::default();
    let mut options = SolverOptions::uniform_weights();
    options.max_solutions = 4;

    let solutions = solver::solve(&mut ctx, &grammar, &formula, &backend, &options).unwrap();
    assert!(!solutions.is_empty());
    for tree in &solutions {
        assert_tags_match(&tree.to_source_string());
    }
}
