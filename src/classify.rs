//! Turn a raw evaluation into exactly one [`FileOutcome`].

use std::sync::LazyLock;

use checkrun_core::{DocumentError, ErrorReason, FileOutcome, parse_document};
use regex::Regex;

use crate::evaluator::RawEvaluation;

#[allow(clippy::expect_used)]
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-Z\\-_]").expect("INVARIANT: ANSI pattern is valid")
});

const TRACE_PREFIX: &str = "trace:";

/// Classify a raw evaluation.
///
/// A non-zero exit is always an evaluation error, whatever stdout holds. A clean exit is parsed as a result
/// document; anything that does not parse is an evaluation error too, so a file is never partially evaluated.
pub fn classify(raw: &RawEvaluation) -> FileOutcome {
    match raw {
        RawEvaluation::TimedOut { after } => {
            FileOutcome::error(format!("timed out after {} ms", after.as_millis()), ErrorReason::TimedOut)
        }
        RawEvaluation::Exited {
            code,
            success: false,
            stdout,
            stderr,
        } => {
            let mut message = diagnostic(stderr, stdout);
            if message.is_empty() {
                message = match code {
                    Some(code) => format!("evaluator exited with status {code}"),
                    None => "evaluator was terminated by a signal".to_string(),
                };
            }
            FileOutcome::error(message, ErrorReason::Crashed)
        }
        RawEvaluation::Exited {
            success: true,
            stdout,
            stderr,
            ..
        } => match parse_document(&String::from_utf8_lossy(stdout)) {
            Ok(tests) => FileOutcome::evaluated(tests),
            Err(DocumentError::ErrorPayload(message)) => FileOutcome::error(message, ErrorReason::Crashed),
            Err(err) => {
                let mut message = format!("malformed result document: {err}");
                let details = clean_diagnostic(&String::from_utf8_lossy(stderr));
                if !details.is_empty() {
                    message.push('\n');
                    message.push_str(&details);
                }
                FileOutcome::error(message, ErrorReason::MalformedOutput)
            }
        },
    }
}

/// Cleaned stderr, falling back to cleaned stdout when stderr has nothing to say.
fn diagnostic(stderr: &[u8], stdout: &[u8]) -> String {
    let from_stderr = clean_diagnostic(&String::from_utf8_lossy(stderr));
    if from_stderr.is_empty() {
        clean_diagnostic(&String::from_utf8_lossy(stdout))
    } else {
        from_stderr
    }
}

/// Remove ANSI escapes and `trace:` lines, then trim surrounding whitespace.
pub fn clean_diagnostic(text: &str) -> String {
    let plain = ANSI_ESCAPE.replace_all(text, "");
    let kept: Vec<&str> = plain
        .lines()
        .filter(|line| !line.trim_start().starts_with(TRACE_PREFIX))
        .collect();
    kept.join("\n").trim().to_string()
}
