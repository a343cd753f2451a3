//! Evaluation invoker: run the external evaluator for one file and capture what it produced.
//!
//! Each invocation is its own child process with piped stdout/stderr. The invoker never interprets the output;
//! see [`crate::classify`] for that.

use std::env;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;

use crate::config::{ATTRIBUTE_PLACEHOLDER, Config, FILE_PLACEHOLDER, LIBRARY_PLACEHOLDER};

/// What a finished (or abandoned) evaluator process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvaluation {
    Exited {
        /// `None` when the process was terminated by a signal.
        code: Option<i32>,
        success: bool,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The deadline passed; the process was killed.
    TimedOut { after: Duration },
}

impl RawEvaluation {
    pub fn exited(code: i32, stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        RawEvaluation::Exited {
            code: Some(code),
            success: code == 0,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    /// The evaluator binary does not exist. Fatal for the whole run.
    #[error("evaluator `{program}` not found; is it installed and on PATH?")]
    ProgramNotFound { program: String },

    #[error("failed to start evaluator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to collect output of evaluator `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Something that can evaluate a single test file.
///
/// Implementations must not share mutable state between calls; the scheduler runs many calls concurrently.
pub trait FileEvaluator: Send + Sync {
    fn evaluate(&self, file: &Path) -> impl Future<Output = Result<RawEvaluation, InvokeError>> + Send;
}

// ============================================================================
// Process evaluator
// ============================================================================

/// Runs the configured evaluator program as a child process.
#[derive(Debug, Clone)]
pub struct ProcessEvaluator {
    program: String,
    args: Vec<String>,
    library: Option<String>,
    attribute: String,
    timeout: Option<Duration>,
}

impl ProcessEvaluator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            library: None,
            attribute: String::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.evaluator.program.clone(),
            args: config.evaluator.args.clone(),
            library: config.evaluator.library.clone(),
            attribute: config.evaluator.attribute.clone(),
            timeout: (config.runner.timeout > 0).then(|| Duration::from_millis(config.runner.timeout)),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Expand the argument template for `file`.
    pub fn args_for(&self, file: &Path) -> Vec<String> {
        let file = file.display().to_string();
        let values = [
            (FILE_PLACEHOLDER, file.as_str()),
            (LIBRARY_PLACEHOLDER, self.library.as_deref().unwrap_or_default()),
            (ATTRIBUTE_PLACEHOLDER, self.attribute.as_str()),
        ];
        self.args.iter().map(|arg| expand(arg, &values)).collect()
    }

    /// Fail early when the program cannot be found, before any file is scheduled.
    pub fn ensure_available(&self) -> Result<(), InvokeError> {
        if find_program(&self.program).is_some() {
            Ok(())
        } else {
            Err(InvokeError::ProgramNotFound {
                program: self.program.clone(),
            })
        }
    }
}

impl FileEvaluator for ProcessEvaluator {
    async fn evaluate(&self, file: &Path) -> Result<RawEvaluation, InvokeError> {
        let args = self.args_for(file);
        tracing::debug!(program = %self.program, ?args, "spawning evaluator");

        let started = Instant::now();
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => InvokeError::ProgramNotFound {
                    program: self.program.clone(),
                },
                _ => InvokeError::Spawn {
                    program: self.program.clone(),
                    source,
                },
            })?;

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    // Dropping the output future drops the child, which kills it.
                    tracing::warn!(
                        file = %file.display(),
                        timeout_ms = limit.as_millis() as u64,
                        "evaluator timed out"
                    );
                    return Ok(RawEvaluation::TimedOut { after: limit });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|source| InvokeError::Wait {
            program: self.program.clone(),
            source,
        })?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if !output.status.success() {
            tracing::warn!(
                file = %file.display(),
                code = ?output.status.code(),
                elapsed_ms,
                "evaluator exited abnormally"
            );
        }

        Ok(RawEvaluation::Exited {
            code: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Substitute placeholders in a single left-to-right pass; substituted text is never rescanned.
fn expand(template: &str, values: &[(&str, &str)]) -> String {
    let mut expanded = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(placeholder, value)| rest.find(placeholder).map(|at| (at, *placeholder, *value)))
            .min_by_key(|(at, _, _)| *at);
        let Some((at, placeholder, value)) = next else {
            expanded.push_str(rest);
            return expanded;
        };
        expanded.push_str(&rest[..at]);
        expanded.push_str(value);
        rest = &rest[at + placeholder.len()..];
    }
}

/// Resolve `program` the way the OS would: paths are checked directly, bare names against `PATH`.
pub fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}
