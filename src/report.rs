//! Verbosity-gated console reporting (spec.md "[ADDED] Logging /
//! diagnostics"): deliberately built on `termcolor` rather than the `log`
//! crate, matching the teacher's own choice of direct, colored console
//! output over a logging facade for user-facing search progress.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::cost::Verbosity;
use crate::tree::DerivationTree;

/// Prints search progress to stdout/stderr, gated by a configured
/// [`Verbosity`].
pub struct Reporter {
    verbosity: Verbosity,
    stdout: StandardStream,
    stderr: StandardStream,
}

impl Reporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Reporter {
            verbosity,
            stdout: StandardStream::stdout(ColorChoice::Auto),
            stderr: StandardStream::stderr(ColorChoice::Auto),
        }
    }

    fn print_if_allowed(&mut self, minimum: Verbosity, color: Color, prefix: &str, message: &str) {
        if self.verbosity < minimum {
            return;
        }
        let stream = if minimum >= Verbosity::Debug { &mut self.stderr } else { &mut self.stdout };
        let _ = stream.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(stream, "{prefix}");
        let _ = stream.reset();
        let _ = writeln!(stream, " {message}");
    }

    pub fn solution_found(&mut self, tree: &DerivationTree) {
        self.print_if_allowed(Verbosity::Quiet, Color::Green, "[solution]", &tree.to_source_string());
    }

    pub fn state_expanded(&mut self, open_leaves: usize, cost: f64) {
        self.print_if_allowed(
            Verbosity::Normal,
            Color::Blue,
            "[expand]",
            &format!("{open_leaves} open leaves, cost {cost:.3}"),
        );
    }

    pub fn unsat(&mut self) {
        self.print_if_allowed(Verbosity::Quiet, Color::Red, "[unsat]", "no solution found");
    }

    pub fn debug(&mut self, message: &str) {
        self.print_if_allowed(Verbosity::Debug, Color::Yellow, "[debug]", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_reporter_accepts_solution_without_panicking() {
        let mut ctx = crate::context::Context::new();
        let tree = DerivationTree::terminal(&mut ctx, "x");
        let mut reporter = Reporter::new(Verbosity::Quiet);
        reporter.solution_found(&tree);
        reporter.debug("this should be suppressed at Quiet");
    }
}
