//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use checkrun_core::{RunStatus, RunSummary};

use crate::config::{Config, ResolvedConfig};
use crate::discovery::TestFileDiscoverer;
use crate::evaluator::ProcessEvaluator;
use crate::report;
use crate::scheduler::{self, Scheduler, SchedulerError};

use super::{CliError, CliResult, ExitCode};

// ============================================================================
// Show config
// ============================================================================

/// Print the effective configuration as TOML.
pub fn show_config(resolved: &ResolvedConfig) -> CliResult<ExitCode> {
    let text = resolved
        .config
        .to_toml()
        .map_err(|e| CliError::failure(format!("failed to render configuration: {e}")))?;

    let mut out = io::stdout().lock();
    let source = match &resolved.source {
        Some(path) => format!("# loaded from {}", path.display()),
        None => "# no config file found; built-in defaults".to_string(),
    };
    writeln!(out, "{source}\n{text}").map_err(write_error)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Run tests
// ============================================================================

/// Discover, evaluate and report.
///
/// ## Returns
///
/// - `ExitCode::SUCCESS` when every file passed, or no file was found
/// - `ExitCode::FAILURE` when any check failed or any file errored
///
/// ## Errors
///
/// - configuration errors (exit 2), a missing evaluator (exit 1) and interrupts (exit 130); no report is printed
pub fn run_tests(paths: &[PathBuf], config: &Config) -> CliResult<ExitCode> {
    config.validate().map_err(CliError::config)?;

    let discovery = TestFileDiscoverer::from_config(&config.discovery).discover(paths);
    report::write_warnings(&discovery.warnings, &mut io::stderr().lock()).map_err(write_error)?;

    let summary = if discovery.files.is_empty() {
        RunSummary::default()
    } else {
        evaluate_all(&discovery.files, config)?
    };

    let reporter = report::reporter_for(config.report.format, config.report.color);
    let mut out = io::stdout().lock();
    reporter.render(&summary, &mut out).map_err(write_error)?;
    out.flush().map_err(write_error)?;

    Ok(match summary.status() {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::Failure => ExitCode::FAILURE,
    })
}

fn evaluate_all(files: &[PathBuf], config: &Config) -> CliResult<RunSummary> {
    let evaluator = ProcessEvaluator::from_config(config);
    evaluator.ensure_available().map_err(|e| CliError::failure(e.to_string()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.runner.num_threads.get())
        .enable_all()
        .build()
        .map_err(|e| CliError::failure(format!("failed to start worker pool: {e}")))?;

    let scheduler = Scheduler::new(Arc::new(evaluator), config.runner.num_threads);
    let results = runtime.block_on(scheduler.run_until(files, scheduler::ctrl_c()));
    match results {
        Ok(results) => Ok(RunSummary::fold(files, results)),
        Err(SchedulerError::Interrupted) => Err(CliError::new("interrupted", ExitCode::INTERRUPTED)),
        Err(e) => Err(CliError::failure(e.to_string())),
    }
}

fn write_error(e: io::Error) -> CliError {
    CliError::failure(format!("failed to write output: {e}"))
}
