//! Bounded-parallel evaluation of discovered files.
//!
//! Every file is evaluated exactly once, by its own task. At most `num_threads` evaluations are in flight; a
//! semaphore permit is taken in discovery order before each task is spawned. Each task hands back one complete
//! `(index, file, outcome)` triple, so no partial result for a file is ever visible.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use checkrun_core::{ErrorReason, FileOutcome};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};

use crate::classify::classify;
use crate::evaluator::{FileEvaluator, InvokeError};

/// Failures that abort the whole run. Per-file problems are outcomes, not errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("{0}")]
    EvaluatorMissing(InvokeError),

    #[error("interrupted")]
    Interrupted,

    #[error("worker pool closed unexpectedly")]
    PoolClosed,
}

pub struct Scheduler<E> {
    evaluator: Arc<E>,
    num_threads: NonZeroUsize,
}

type Completed = (usize, PathBuf, FileOutcome);

impl<E> Scheduler<E>
where
    E: FileEvaluator + 'static,
{
    pub fn new(evaluator: Arc<E>, num_threads: NonZeroUsize) -> Self {
        Self { evaluator, num_threads }
    }

    /// Evaluate every file and return the outcomes in discovery order.
    ///
    /// ## Notes
    ///
    /// - A panicking evaluation becomes an evaluation error for that file only.
    /// - A missing evaluator program aborts the run; remaining tasks are aborted and their children killed.
    #[tracing::instrument(
        name = "schedule",
        skip_all,
        fields(files = files.len(), num_threads = self.num_threads.get())
    )]
    pub async fn run(&self, files: &[PathBuf]) -> Result<Vec<(PathBuf, FileOutcome)>, SchedulerError> {
        let permits = Arc::new(Semaphore::new(self.num_threads.get()));
        let mut tasks: JoinSet<Result<Completed, SchedulerError>> = JoinSet::new();
        let mut spawned = HashMap::new();
        let mut completed = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::PoolClosed)?;
            // A finished task may carry a fatal error; stop before spawning more work.
            while let Some(joined) = tasks.try_join_next_with_id() {
                if let Err(err) = reap(joined, &mut spawned, &mut completed) {
                    tasks.abort_all();
                    return Err(err);
                }
            }
            let evaluator = Arc::clone(&self.evaluator);
            let task_file = file.clone();
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let started = Instant::now();
                tracing::debug!(file = %task_file.display(), "evaluating");
                let outcome = match evaluator.evaluate(&task_file).await {
                    Ok(raw) => classify(&raw),
                    Err(err @ InvokeError::ProgramNotFound { .. }) => {
                        return Err(SchedulerError::EvaluatorMissing(err));
                    }
                    Err(err) => FileOutcome::error(err.to_string(), ErrorReason::SpawnFailed),
                };
                tracing::debug!(
                    file = %task_file.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    status = ?outcome.status(),
                    "evaluated"
                );
                Ok((index, task_file, outcome))
            });
            spawned.insert(handle.id(), (index, file.clone()));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            if let Err(err) = reap(joined, &mut spawned, &mut completed) {
                tasks.abort_all();
                return Err(err);
            }
        }

        completed.sort_by_key(|(index, _, _)| *index);
        Ok(completed.into_iter().map(|(_, file, outcome)| (file, outcome)).collect())
    }

    /// Like [`Scheduler::run`], but stop as soon as `shutdown` completes.
    ///
    /// On shutdown every in-flight task is aborted, which kills its child process, and no results are returned.
    pub async fn run_until<F>(
        &self,
        files: &[PathBuf],
        shutdown: F,
    ) -> Result<Vec<(PathBuf, FileOutcome)>, SchedulerError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            results = self.run(files) => results,
            () = shutdown => {
                tracing::warn!("interrupted; aborting in-flight evaluations");
                Err(SchedulerError::Interrupted)
            }
        }
    }
}

/// Record one joined task. A panicked task becomes a crash outcome for its file; a fatal error is returned.
fn reap(
    joined: Result<(Id, Result<Completed, SchedulerError>), JoinError>,
    spawned: &mut HashMap<Id, (usize, PathBuf)>,
    completed: &mut Vec<Completed>,
) -> Result<(), SchedulerError> {
    match joined {
        Ok((id, Ok(entry))) => {
            spawned.remove(&id);
            completed.push(entry);
            Ok(())
        }
        Ok((_, Err(err))) => Err(err),
        Err(join_err) => {
            if let Some((index, file)) = spawned.remove(&join_err.id()) {
                tracing::warn!(file = %file.display(), error = %join_err, "evaluation task failed");
                let outcome = FileOutcome::error(format!("evaluation task failed: {join_err}"), ErrorReason::Crashed);
                completed.push((index, file, outcome));
            }
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
pub async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Tests
// ============================================================================
