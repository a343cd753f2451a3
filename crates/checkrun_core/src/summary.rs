//! Run-level aggregation of per-file outcomes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::{FileOutcome, FileStatus};

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
}

/// One file and its outcome, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Aggregate across all discovered files.
///
/// Entries are kept in discovery order; every count is derived from them on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RunSummary {
    files: Vec<FileEntry>,
}

impl RunSummary {
    /// Fold `(file, outcome)` pairs into a summary ordered by `discovered`.
    ///
    /// ## Parameters
    ///
    /// - `discovered`: files in discovery order
    /// - `results`: outcomes in any order (typically completion order)
    ///
    /// ## Notes
    ///
    /// - The result does not depend on the order of `results`.
    /// - A discovered file without an outcome is left out; an outcome for a file that was not discovered is
    ///   appended after the discovered ones, in path order.
    pub fn fold<I>(discovered: &[PathBuf], results: I) -> Self
    where
        I: IntoIterator<Item = (PathBuf, FileOutcome)>,
    {
        let mut outcomes: HashMap<PathBuf, FileOutcome> = results.into_iter().collect();
        let mut files: Vec<FileEntry> = discovered
            .iter()
            .filter_map(|path| {
                outcomes.remove(path).map(|outcome| FileEntry {
                    path: path.clone(),
                    outcome,
                })
            })
            .collect();

        let mut strays: Vec<FileEntry> = outcomes
            .into_iter()
            .map(|(path, outcome)| FileEntry { path, outcome })
            .collect();
        strays.sort_by(|a, b| a.path.cmp(&b.path));
        files.extend(strays);

        Self { files }
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn outcome(&self, path: &Path) -> Option<&FileOutcome> {
        self.files.iter().find(|entry| entry.path == path).map(|entry| &entry.outcome)
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    pub fn passed_files(&self) -> usize {
        self.count(FileStatus::Passed)
    }

    /// Files that evaluated with at least one failed check.
    pub fn failed_files(&self) -> usize {
        self.count(FileStatus::Failed)
    }

    pub fn errored_files(&self) -> usize {
        self.count(FileStatus::Errored)
    }

    pub fn failed_checks(&self) -> usize {
        self.files.iter().map(|entry| entry.outcome.failed_checks()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn status(&self) -> RunStatus {
        if self.failed_files() + self.errored_files() > 0 {
            RunStatus::Failure
        } else {
            RunStatus::Success
        }
    }

    fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|entry| entry.outcome.status() == status).count()
    }
}
