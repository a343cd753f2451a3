//! Per-check, per-test and per-file outcomes.
//!
//! Tests are identified by their `path` (group names followed by the test's own name) rather than by a tree of
//! group objects. A test's success is always recomputed from its checks.

use std::fmt;

use serde::{Serialize, Serializer};

/// Location reported for a test whose source position the evaluator did not provide.
pub const UNKNOWN_LOCATION: &str = "unknown";

/// Separator used when a test path is rendered for humans.
pub const PATH_SEPARATOR: &str = " -> ";

// ============================================================================
// Checks
// ============================================================================

/// Outcome of a single assertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CheckOutcome {
    Passed,
    /// `message` is `None` for a generic failure.
    Failed { message: Option<String> },
}

/// One named assertion inside a test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckResult {
    pub name: String,
    pub outcome: CheckOutcome,
}

impl CheckResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: CheckOutcome::Passed,
        }
    }

    pub fn failed(name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            name: name.into(),
            outcome: CheckOutcome::Failed { message },
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Passed)
    }

    /// Failure message, if the check failed with one.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            CheckOutcome::Passed => None,
            CheckOutcome::Failed { message } => message.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct CheckRecord<'a> {
    name: &'a str,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for CheckResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CheckRecord {
            name: &self.name,
            success: self.success(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

// ============================================================================
// Tests
// ============================================================================

/// One named test, possibly nested under groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestResult {
    /// Group names followed by the test's own name.
    pub path: Vec<String>,
    /// `<file>:<line>` of the test's check block, or [`UNKNOWN_LOCATION`].
    pub location: String,
    /// Checks in declaration order.
    pub checks: Vec<CheckResult>,
}

impl TestResult {
    pub fn new(path: Vec<String>, location: impl Into<String>, checks: Vec<CheckResult>) -> Self {
        Self {
            path,
            location: location.into(),
            checks,
        }
    }

    /// True iff every check passed. A test without checks succeeds.
    pub fn success(&self) -> bool {
        self.checks.iter().all(CheckResult::success)
    }

    pub fn failed_checks(&self) -> usize {
        self.checks.iter().filter(|check| !check.success()).count()
    }

    /// The path joined for display, e.g. `math -> addition`.
    pub fn display_path(&self) -> String {
        self.path.join(PATH_SEPARATOR)
    }
}

#[derive(Serialize)]
struct TestRecord<'a> {
    path: &'a [String],
    location: &'a str,
    success: bool,
    checks: &'a [CheckResult],
}

impl Serialize for TestResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TestRecord {
            path: &self.path,
            location: &self.location,
            success: self.success(),
            checks: &self.checks,
        }
        .serialize(serializer)
    }
}

// ============================================================================
// Files
// ============================================================================

/// Why a file produced no per-test results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorReason {
    /// Non-zero exit, or an error payload from the evaluator.
    Crashed,
    TimedOut,
    /// Exit status was clean but the output was not a result document.
    MalformedOutput,
    /// The evaluator process could not be started for this file.
    SpawnFailed,
}

impl ErrorReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorReason::Crashed => "crashed",
            ErrorReason::TimedOut => "timed-out",
            ErrorReason::MalformedOutput => "malformed-output",
            ErrorReason::SpawnFailed => "spawn-failed",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of attempting to evaluate one file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileOutcome {
    /// The evaluator ran to completion and returned a well-formed result document.
    Evaluated { tests: Vec<TestResult> },
    /// No per-test information is available.
    EvaluationError { message: String, reason: ErrorReason },
}

/// Accounting bucket a file falls into. Exactly one per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    Passed,
    Failed,
    Errored,
}

impl FileOutcome {
    pub fn evaluated(tests: Vec<TestResult>) -> Self {
        FileOutcome::Evaluated { tests }
    }

    pub fn error(message: impl Into<String>, reason: ErrorReason) -> Self {
        FileOutcome::EvaluationError {
            message: message.into(),
            reason,
        }
    }

    pub fn status(&self) -> FileStatus {
        match self {
            FileOutcome::Evaluated { tests } if tests.iter().all(TestResult::success) => FileStatus::Passed,
            FileOutcome::Evaluated { .. } => FileStatus::Failed,
            FileOutcome::EvaluationError { .. } => FileStatus::Errored,
        }
    }

    /// Number of failed checks across all tests. Zero for evaluation errors.
    pub fn failed_checks(&self) -> usize {
        match self {
            FileOutcome::Evaluated { tests } => tests.iter().map(TestResult::failed_checks).sum(),
            FileOutcome::EvaluationError { .. } => 0,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
