//! Provide the result model and result-document parsing shared by the checkrun runner and its reporters.
//!
//! ## Notes
//!
//! - This is a pure crate: **no IO**, no process spawning, and no global state.
//! - `model` holds per-check, per-test and per-file outcomes; `summary` folds them into a run-level view;
//!   `document` turns the evaluator's JSON result document into `TestResult`s.

pub mod document;
pub mod model;
pub mod summary;

pub use document::{DocumentError, parse_document};
pub use model::{CheckOutcome, CheckResult, ErrorReason, FileOutcome, FileStatus, TestResult, UNKNOWN_LOCATION};
pub use summary::{FileEntry, RunStatus, RunSummary};
