//! Parse the evaluator's JSON result document into `TestResult`s.
//!
//! Accepted shapes:
//!
//! ```text
//! { "tests": [ <entry>, ... ] }
//! [ <entry>, ... ]
//! ```
//!
//! An entry is either a test or a group:
//!
//! ```text
//! { "path": ["group", "name"] | "name", "location": "file.nix:3", "checks": [ <check>, ... ], "success": bool }
//! { "group": "name", "tests": [ <entry>, ... ] }
//! ```
//!
//! A check carries `success` (with an optional `error`), or a raw `result` that is `true`, `false`, or a failure
//! message string. Anything else makes the whole document invalid: a file never yields a partially parsed result.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::{CheckResult, PATH_SEPARATOR, TestResult, UNKNOWN_LOCATION};

/// Why a result document could not be turned into tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("output is not valid JSON: {0}")]
    InvalidJson(String),

    /// The evaluator returned `{ "error": ... }` instead of results.
    #[error("{0}")]
    ErrorPayload(String),

    #[error("unexpected result document: {0}")]
    Shape(String),

    #[error("test `{test}`: check `{check}` has a result that is neither a boolean nor a string")]
    InvalidCheckResult { test: String, check: String },

    #[error("test `{test}`: check `{check}` has no result")]
    MissingCheckResult { test: String, check: String },

    #[error("test `{test}` reports success = {reported}, but its checks evaluate to {actual}")]
    InconsistentSuccess { test: String, reported: bool, actual: bool },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPath {
    Segments(Vec<String>),
    Single(String),
}

#[derive(Debug, Deserialize)]
struct RawTest {
    path: RawPath,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    checks: Vec<RawCheck>,
    #[serde(default)]
    success: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawCheck {
    name: String,
    #[serde(default)]
    success: Option<Value>,
    #[serde(default, alias = "failure")]
    error: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    group: String,
    tests: Vec<Value>,
}

/// Parse evaluator stdout into tests, in document order.
///
/// ## Parameters
///
/// - `text`: the evaluator's stdout, already decoded
///
/// ## Returns
///
/// - `Ok(tests)` for a well-formed document (possibly empty)
/// - `Err(DocumentError::ErrorPayload)` when the evaluator returned an error object
/// - another `Err` for any document that does not match the accepted shapes
pub fn parse_document(text: &str) -> Result<Vec<TestResult>, DocumentError> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|err| DocumentError::InvalidJson(err.to_string()))?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match (object.remove("tests"), object.remove("error")) {
            (Some(Value::Array(entries)), _) => entries,
            (Some(other), _) => {
                return Err(DocumentError::Shape(format!("`tests` must be a list, found {}", kind(&other))));
            }
            (None, Some(Value::String(message))) => return Err(DocumentError::ErrorPayload(message)),
            (None, Some(other)) => return Err(DocumentError::ErrorPayload(other.to_string())),
            (None, None) => return Err(DocumentError::Shape("missing `tests` list".into())),
        },
        other => {
            return Err(DocumentError::Shape(format!(
                "expected an object or a list, found {}",
                kind(&other)
            )));
        }
    };

    let mut tests = Vec::new();
    flatten(&[], entries, &mut tests)?;
    Ok(tests)
}

fn flatten(prefix: &[String], entries: Vec<Value>, out: &mut Vec<TestResult>) -> Result<(), DocumentError> {
    for entry in entries {
        let is_group = entry.get("group").is_some() && entry.get("path").is_none();
        if is_group {
            let group: RawGroup = serde_json::from_value(entry).map_err(|err| DocumentError::Shape(err.to_string()))?;
            let mut nested = prefix.to_vec();
            nested.push(group.group);
            flatten(&nested, group.tests, out)?;
        } else {
            let raw: RawTest = serde_json::from_value(entry).map_err(|err| DocumentError::Shape(err.to_string()))?;
            out.push(convert_test(prefix, raw)?);
        }
    }
    Ok(())
}

fn convert_test(prefix: &[String], raw: RawTest) -> Result<TestResult, DocumentError> {
    let mut path = prefix.to_vec();
    match raw.path {
        RawPath::Segments(segments) => path.extend(segments),
        RawPath::Single(name) => path.push(name),
    }
    if path.is_empty() {
        return Err(DocumentError::Shape("test with an empty path".into()));
    }

    let location = raw
        .location
        .filter(|location| !location.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

    let display = path.join(PATH_SEPARATOR);
    let checks = raw
        .checks
        .into_iter()
        .map(|check| convert_check(&display, check))
        .collect::<Result<Vec<_>, _>>()?;

    let test = TestResult::new(path, location, checks);
    if let Some(reported) = raw.success {
        let actual = test.success();
        if reported != actual {
            return Err(DocumentError::InconsistentSuccess {
                test: display,
                reported,
                actual,
            });
        }
    }
    Ok(test)
}

fn convert_check(test: &str, raw: RawCheck) -> Result<CheckResult, DocumentError> {
    let invalid = || DocumentError::InvalidCheckResult {
        test: test.to_string(),
        check: raw.name.clone(),
    };

    match (&raw.success, &raw.result) {
        (Some(Value::Bool(true)), _) => Ok(CheckResult::passed(raw.name.clone())),
        (Some(Value::Bool(false)), _) => Ok(CheckResult::failed(raw.name.clone(), raw.error.clone())),
        (Some(Value::String(message)), _) => Ok(CheckResult::failed(raw.name.clone(), Some(message.clone()))),
        (Some(_), _) => Err(invalid()),
        (None, Some(Value::Bool(true))) => Ok(CheckResult::passed(raw.name.clone())),
        (None, Some(Value::Bool(false))) => Ok(CheckResult::failed(raw.name.clone(), raw.error.clone())),
        (None, Some(Value::String(message))) => Ok(CheckResult::failed(raw.name.clone(), Some(message.clone()))),
        (None, Some(_)) => Err(invalid()),
        (None, None) => Err(DocumentError::MissingCheckResult {
            test: test.to_string(),
            check: raw.name.clone(),
        }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::CheckOutcome;

    #[test]
    fn test_parses_documented_shape() {
        let text = r#"{
            "tests": [
                {
                    "path": ["math", "addition"],
                    "location": "math_test.nix:4",
                    "checks": [
                        { "name": "one plus one", "success": true },
                        { "name": "two plus two", "success": false, "error": "Expected: 1\nGot: 2" }
                    ],
                    "success": false
                }
            ]
        }"#;

        let tests = parse_document(text).unwrap();
        assert_eq!(tests.len(), 1);
        let test = &tests[0];
        assert_eq!(test.path, vec!["math", "addition"]);
        assert_eq!(test.location, "math_test.nix:4");
        assert_eq!(test.checks[0], CheckResult::passed("one plus one"));
        assert_eq!(test.checks[1].error(), Some("Expected: 1\nGot: 2"));
        assert!(!test.success());
    }

    #[test]
    fn test_accepts_bare_list() {
        let tests = parse_document(r#"[{"path": ["a"], "checks": [{"name": "x", "success": true}]}]"#).unwrap();
        assert_eq!(tests.len(), 1);
        assert!(tests[0].success());
    }

    #[test]
    fn test_empty_document_has_no_tests() {
        assert!(parse_document(r#"{"tests": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_missing_location_defaults_to_unknown() {
        let tests = parse_document(r#"[{"path": ["a"], "location": "", "checks": []}, {"path": "b", "checks": []}]"#)
            .unwrap();
        assert_eq!(tests[0].location, UNKNOWN_LOCATION);
        assert_eq!(tests[1].location, UNKNOWN_LOCATION);
        assert_eq!(tests[1].path, vec!["b"]);
    }

    #[test]
    fn test_groups_prefix_paths() {
        let text = r#"{"tests": [
            {"group": "outer", "tests": [
                {"group": "inner", "tests": [
                    {"path": ["leaf"], "checks": [{"name": "c", "success": true}]}
                ]},
                {"path": "sibling", "checks": []}
            ]}
        ]}"#;
        let tests = parse_document(text).unwrap();
        let paths: Vec<String> = tests.iter().map(TestResult::display_path).collect();
        assert_eq!(paths, vec!["outer -> inner -> leaf", "outer -> sibling"]);
    }

    #[test]
    fn test_raw_result_values() {
        let text = r#"[{"path": ["t"], "checks": [
            {"name": "ok", "result": true},
            {"name": "generic", "result": false},
            {"name": "message", "result": "Expected: 1\nGot: 2"}
        ]}]"#;
        let tests = parse_document(text).unwrap();
        let outcomes: Vec<&CheckOutcome> = tests[0].checks.iter().map(|check| &check.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &CheckOutcome::Passed,
                &CheckOutcome::Failed { message: None },
                &CheckOutcome::Failed {
                    message: Some("Expected: 1\nGot: 2".into())
                },
            ]
        );
    }

    #[test]
    fn test_failure_alias_for_error() {
        let tests =
            parse_document(r#"[{"path": ["t"], "checks": [{"name": "c", "success": false, "failure": "bad"}]}]"#)
                .unwrap();
        assert_eq!(tests[0].checks[0].error(), Some("bad"));
    }

    #[test]
    fn test_passed_check_drops_error() {
        let tests =
            parse_document(r#"[{"path": ["t"], "checks": [{"name": "c", "success": true, "error": "stale"}]}]"#)
                .unwrap();
        assert_eq!(tests[0].checks[0].error(), None);
    }

    #[test]
    fn test_non_boolean_result_is_an_error() {
        let err = parse_document(r#"[{"path": ["t"], "checks": [{"name": "c", "result": 42}]}]"#).unwrap_err();
        assert_eq!(
            err,
            DocumentError::InvalidCheckResult {
                test: "t".into(),
                check: "c".into()
            }
        );
    }

    #[test]
    fn test_check_without_result_is_an_error() {
        let err = parse_document(r#"[{"path": ["t"], "checks": [{"name": "c"}]}]"#).unwrap_err();
        assert!(matches!(err, DocumentError::MissingCheckResult { .. }));
    }

    #[test]
    fn test_inconsistent_success_is_an_error() {
        let err = parse_document(r#"[{"path": ["t"], "checks": [{"name": "c", "success": false}], "success": true}]"#)
            .unwrap_err();
        assert_eq!(
            err,
            DocumentError::InconsistentSuccess {
                test: "t".into(),
                reported: true,
                actual: false
            }
        );
    }

    #[test]
    fn test_error_payload() {
        let err = parse_document(r#"{"error": "attribute 'tests' missing"}"#).unwrap_err();
        assert_eq!(err, DocumentError::ErrorPayload("attribute 'tests' missing".into()));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse_document("not json"), Err(DocumentError::InvalidJson(_))));
        assert!(matches!(parse_document(""), Err(DocumentError::InvalidJson(_))));
    }

    #[test]
    fn test_wrong_shapes() {
        assert!(matches!(parse_document("42"), Err(DocumentError::Shape(_))));
        assert!(matches!(parse_document(r#"{"tests": 1}"#), Err(DocumentError::Shape(_))));
        assert!(matches!(parse_document(r#"{"other": 1}"#), Err(DocumentError::Shape(_))));
        assert!(matches!(parse_document(r#"[{"checks": []}]"#), Err(DocumentError::Shape(_))));
    }
}
