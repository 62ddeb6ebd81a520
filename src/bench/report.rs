//! Report emitter
//!
//! Prints each scenario as label, elapsed seconds, then the benchmark's own
//! stdout exactly as captured. Meant for a terminal or a log file, so there
//! is no structured format.

use std::io::{self, Write};

use colored::Colorize;

use super::ScenarioResult;

/// Writes scenario reports to a stream (stdout by default)
pub struct ReportEmitter<W: Write> {
    out: W,
}

impl ReportEmitter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ReportEmitter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Print one scenario block
    pub fn emit(&mut self, result: &ScenarioResult) -> io::Result<()> {
        writeln!(self.out, "{}\n", format!("{}:", result.label()).bold())?;

        if let ScenarioResult::Failed { reason, .. } = result {
            writeln!(self.out, "{} {}", "FAILED:".red().bold(), reason)?;
        }

        if let Some(outcome) = result.outcome() {
            writeln!(self.out, "{:.6}", outcome.elapsed_secs())?;
            self.out.write_all(outcome.stdout.as_bytes())?;
            writeln!(self.out)?;
        }

        self.out.flush()
    }

    /// Print the closing count line
    pub fn summary(&mut self, results: &[ScenarioResult]) -> io::Result<()> {
        let completed = results.iter().filter(|r| r.is_completed()).count();
        let failed = results.len() - completed;

        let line = format!("{} completed, {} failed", completed, failed);
        if failed == 0 {
            writeln!(self.out, "{}", line.green())?;
        } else {
            writeln!(self.out, "{}", line.red())?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
