//! JSON Lines report: one record per file, in discovery order.
//!
//! ```text
//! {"file":"a_test.nix","outcome":"evaluated","success":true,"tests":[...]}
//! {"file":"b_test.nix","outcome":"error","reason":"timed-out","message":"timed out after 100 ms"}
//! ```

use std::borrow::Cow;
use std::io::{self, Write};

use checkrun_core::{ErrorReason, FileEntry, FileOutcome, FileStatus, RunSummary, TestResult};
use serde::Serialize;

use super::Reporter;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
enum FileRecord<'a> {
    Evaluated {
        file: Cow<'a, str>,
        success: bool,
        tests: &'a [TestResult],
    },
    Error {
        file: Cow<'a, str>,
        reason: ErrorReason,
        message: &'a str,
    },
}

impl<'a> From<&'a FileEntry> for FileRecord<'a> {
    fn from(entry: &'a FileEntry) -> Self {
        let file = entry.path.to_string_lossy();
        match &entry.outcome {
            FileOutcome::Evaluated { tests } => FileRecord::Evaluated {
                file,
                success: entry.outcome.status() == FileStatus::Passed,
                tests,
            },
            FileOutcome::EvaluationError { message, reason } => FileRecord::Error {
                file,
                reason: *reason,
                message,
            },
        }
    }
}

impl Reporter for JsonReporter {
    fn render(&self, summary: &RunSummary, out: &mut dyn Write) -> io::Result<()> {
        for entry in summary.files() {
            serde_json::to_writer(&mut *out, &FileRecord::from(entry))?;
            writeln!(out)?;
        }
        out.flush()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use checkrun_core::CheckResult;
    use serde_json::{Value, json};

    fn render(summary: &RunSummary) -> String {
        let mut out = Vec::new();
        JsonReporter.render(summary, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_one_record_per_file() {
        let discovered = vec![PathBuf::from("math_test.nix"), PathBuf::from("slow_test.nix")];
        let summary = RunSummary::fold(
            &discovered,
            vec![
                (
                    PathBuf::from("slow_test.nix"),
                    FileOutcome::error("timed out after 100 ms", ErrorReason::TimedOut),
                ),
                (
                    PathBuf::from("math_test.nix"),
                    FileOutcome::evaluated(vec![TestResult::new(
                        vec!["math".into(), "addition".into()],
                        "math_test.nix:12",
                        vec![
                            CheckResult::passed("one"),
                            CheckResult::failed("four", Some("Expected: 1\nGot: 2".into())),
                        ],
                    )]),
                ),
            ],
        );

        let text = render(&summary);
        let records: Vec<Value> = text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(
            records,
            vec![
                json!({
                    "file": "math_test.nix",
                    "outcome": "evaluated",
                    "success": false,
                    "tests": [{
                        "path": ["math", "addition"],
                        "location": "math_test.nix:12",
                        "success": false,
                        "checks": [
                            {"name": "one", "success": true},
                            {"name": "four", "success": false, "error": "Expected: 1\nGot: 2"}
                        ]
                    }]
                }),
                json!({
                    "file": "slow_test.nix",
                    "outcome": "error",
                    "reason": "timed-out",
                    "message": "timed out after 100 ms"
                }),
            ]
        );
    }

    #[test]
    fn test_no_files_no_records() {
        assert_eq!(render(&RunSummary::default()), "");
    }

    #[test]
    fn test_records_are_single_lines() {
        let discovered = vec![PathBuf::from("a_test.nix")];
        let summary = RunSummary::fold(
            &discovered,
            vec![(
                PathBuf::from("a_test.nix"),
                FileOutcome::error("line one\nline two", ErrorReason::Crashed),
            )],
        );
        let text = render(&summary);
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
    }
}
