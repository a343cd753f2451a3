//! Human-readable report.
//!
//! ```text
//! Testing: tests/math_test.nix
//! ✓ math -> addition -> one plus one
//! ✗ math -> addition -> two plus two
//!     Failure:
//!       Expected: 4
//!       Got: 5
//!       at tests/math_test.nix:12
//! FAILED (1 failed)
//! ```

use std::io::{self, Write};

use checkrun_core::{CheckOutcome, ErrorReason, FileEntry, FileOutcome, FileStatus, RunStatus, RunSummary, TestResult};

use super::Reporter;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, Default)]
pub struct HumanReporter {
    color: bool,
}

impl HumanReporter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn write_file(&self, entry: &FileEntry, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Testing: {}", entry.path.display())?;
        match &entry.outcome {
            FileOutcome::Evaluated { tests } => {
                for test in tests {
                    self.write_test(test, out)?;
                }
                match entry.outcome.status() {
                    FileStatus::Passed => writeln!(out, "{}", self.paint(GREEN, "PASSED"))?,
                    _ => {
                        let line = format!("FAILED ({} failed)", entry.outcome.failed_checks());
                        writeln!(out, "{}", self.paint(RED, &line))?;
                    }
                }
            }
            FileOutcome::EvaluationError { message, reason } => {
                let header = match reason {
                    ErrorReason::Crashed => "ERROR".to_string(),
                    other => format!("ERROR ({other})"),
                };
                writeln!(out, "{}", self.paint(BOLD_RED, &header))?;
                for line in message.lines() {
                    writeln!(out, "    {line}")?;
                }
            }
        }
        writeln!(out)
    }

    fn write_test(&self, test: &TestResult, out: &mut dyn Write) -> io::Result<()> {
        let path = test.display_path();
        if test.checks.is_empty() {
            return writeln!(out, "{} {path} {}", self.paint(GREEN, "✓"), self.paint(DIM, "(no checks)"));
        }

        for check in &test.checks {
            match &check.outcome {
                CheckOutcome::Passed => {
                    writeln!(out, "{} {path} -> {}", self.paint(GREEN, "✓"), check.name)?;
                }
                CheckOutcome::Failed { message } => {
                    writeln!(out, "{} {path} -> {}", self.paint(RED, "✗"), check.name)?;
                    match message {
                        Some(message) => {
                            writeln!(out, "    Failure:")?;
                            for line in message.lines() {
                                writeln!(out, "      {line}")?;
                            }
                            writeln!(out, "      {}", self.paint(DIM, &format!("at {}", test.location)))?;
                        }
                        None => writeln!(out, "    Failed {}", self.paint(DIM, &format!("at {}", test.location)))?,
                    }
                }
            }
        }
        Ok(())
    }

    fn summary_line(&self, summary: &RunSummary) -> String {
        if summary.is_empty() {
            return "no test files found".to_string();
        }
        if summary.status() == RunStatus::Success {
            let line = format!("All tests passed ({} file(s))", summary.total_files());
            return self.paint(BOLD_GREEN, &line);
        }
        let line = format!(
            "{} file(s): {} passed, {} failed, {} errored; {} failed check(s)",
            summary.total_files(),
            summary.passed_files(),
            summary.failed_files(),
            summary.errored_files(),
            summary.failed_checks()
        );
        self.paint(BOLD_RED, &line)
    }
}

impl Reporter for HumanReporter {
    fn render(&self, summary: &RunSummary, out: &mut dyn Write) -> io::Result<()> {
        for entry in summary.files() {
            self.write_file(entry, out)?;
        }
        writeln!(out, "{}", self.summary_line(summary))
    }
}
