//! CLI module for checkrun
//!
//! ## Usage
//!
//! ```text
//! checkrun [PATHS]... [--format human|json] [-j|--jobs N] [--timeout MS] [--config PATH]
//!                     [--library PATH] [--evaluator PROGRAM] [--color auto|always|never] [--show-config]
//! ```
//!
//! ## Exit codes
//!
//! - `0`: every file evaluated and every check passed (including "no test files found")
//! - `1`: a check failed, a file could not be evaluated, or the evaluator is missing
//! - `2`: configuration error
//! - `130`: interrupted
//!
//! ## Design
//!
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::env;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use crate::config::{ColorChoice, Config, ConfigError, ConfigOverrides, OutputFormat};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    pub const USAGE: ExitCode = ExitCode(2);
    pub const INTERRUPTED: ExitCode = ExitCode(130);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Render a configuration error with its source context (exit code 2).
    pub fn config(err: ConfigError) -> Self {
        let report = miette::Report::new(err);
        Self::new(format!("{report:?}"), ExitCode::USAGE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run evaluator-driven specification tests in parallel
#[derive(Parser, Debug)]
#[command(name = "checkrun")]
#[command(version = VERSION)]
#[command(about = "Run evaluator-driven specification tests in parallel", long_about = None)]
pub struct Cli {
    /// Test files or directories to search (default: current directory)
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Number of files evaluated concurrently
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<NonZeroUsize>,

    /// Per-file timeout in milliseconds (0 disables it)
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Config file, or a directory to start the config search from
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Checking-library entry point passed to the evaluator
    #[arg(long, value_name = "PATH", env = "CHECKRUN_LIB_PATH")]
    pub library: Option<String>,

    /// Evaluator program
    #[arg(long, value_name = "PROGRAM")]
    pub evaluator: Option<String>,

    /// Evaluator argument template entry; repeat to build the full list ({file}, {library}, {attribute})
    #[arg(long = "evaluator-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub evaluator_args: Vec<String>,

    /// Attribute holding the test results in each file
    #[arg(long, value_name = "NAME")]
    pub attribute: Option<String>,

    /// File-name suffix that marks a test file
    #[arg(long, value_name = "SUFFIX")]
    pub suffix: Option<String>,

    /// When to color human output
    #[arg(long, value_enum)]
    pub color: Option<ColorChoice>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            num_threads: self.jobs,
            timeout: self.timeout,
            format: self.format,
            color: self.color,
            program: self.evaluator.clone(),
            args: (!self.evaluator_args.is_empty()).then(|| self.evaluator_args.clone()),
            library: self.library.clone(),
            attribute: self.attribute.clone(),
            suffix: self.suffix.clone(),
        }
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    let cwd =
        env::current_dir().map_err(|e| CliError::failure(format!("cannot determine current directory: {e}")))?;
    let resolved = Config::resolve(cli.config.as_deref(), &cwd, &cli.overrides()).map_err(CliError::config)?;

    if cli.show_config {
        return commands::show_config(&resolved);
    }
    commands::run_tests(&cli.paths, &resolved.config)
}

// ============================================================================
// Tests
// ============================================================================
