#![forbid(unsafe_code)]
//! checkrun: parallel test orchestration for evaluator-driven specification files
//!
//! Test files are evaluated by an external, deterministic evaluator (`nix-instantiate` by default), one child
//! process per file, under a bounded worker pool. Each file's output is classified into a typed outcome,
//! aggregated, and reported for humans or as JSON Lines.
//!
//! ## Pipeline
//!
//! `config` → `discovery` → `scheduler` (driving `evaluator` and `classify`) → `RunSummary::fold` → `report`
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//! - A panic inside one file's evaluation is contained to that file and reported as an evaluation error.

pub mod classify;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod evaluator;
pub mod report;
pub mod scheduler;

pub use checkrun_core::{
    CheckOutcome, CheckResult, ErrorReason, FileEntry, FileOutcome, FileStatus, RunStatus, RunSummary, TestResult,
};
pub use config::{Config, ConfigError, ConfigOverrides, OutputFormat};
pub use discovery::{Discovery, DiscoveryWarning, TestFileDiscoverer};
pub use evaluator::{FileEvaluator, InvokeError, ProcessEvaluator, RawEvaluation};
pub use scheduler::{Scheduler, SchedulerError};
