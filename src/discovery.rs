//! Test-file discovery.
//!
//! Roots are files or directories. Directories are walked recursively with entries sorted by name, and hidden
//! directories are not descended into. The result is de-duplicated by canonical path, keeping the first
//! occurrence and the path as the user spelled it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::config::DiscoveryConfig;

/// A root that was skipped. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryWarning {
    #[error("'{}' not found, skipping", .0.display())]
    NotFound(PathBuf),

    #[error("'{}' is not a test file, skipping", .0.display())]
    NotATestFile(PathBuf),

    #[error("cannot read '{}': {message}", path.display())]
    Unreadable { path: PathBuf, message: String },
}

/// Files to evaluate, in discovery order, plus anything skipped along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<DiscoveryWarning>,
}

/// Finds files whose name ends with the configured suffix.
#[derive(Debug, Clone)]
pub struct TestFileDiscoverer {
    suffix: String,
}

impl TestFileDiscoverer {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self { suffix: suffix.into() }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new(config.suffix.clone())
    }

    pub fn is_test_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&self.suffix))
    }

    /// Discover test files under `roots`; an empty slice means the current directory.
    pub fn discover<P: AsRef<Path>>(&self, roots: &[P]) -> Discovery {
        let mut discovery = Discovery::default();
        let mut seen = HashSet::new();

        let default_root = [PathBuf::from(".")];
        let roots: Vec<&Path> = if roots.is_empty() {
            default_root.iter().map(PathBuf::as_path).collect()
        } else {
            roots.iter().map(|root| root.as_ref()).collect()
        };

        for root in roots {
            for file in self.files_under(root, &mut discovery.warnings) {
                let key = fs::canonicalize(&file).unwrap_or_else(|_| file.clone());
                if seen.insert(key) {
                    discovery.files.push(file);
                }
            }
        }

        tracing::debug!(
            files = discovery.files.len(),
            warnings = discovery.warnings.len(),
            "discovery finished"
        );
        discovery
    }

    fn files_under(&self, root: &Path, warnings: &mut Vec<DiscoveryWarning>) -> Vec<PathBuf> {
        if root.is_file() {
            if self.is_test_file(root) {
                return vec![root.to_path_buf()];
            }
            warnings.push(DiscoveryWarning::NotATestFile(root.to_path_buf()));
            return Vec::new();
        }
        if !root.is_dir() {
            warnings.push(DiscoveryWarning::NotFound(root.to_path_buf()));
            return Vec::new();
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden_dir(entry));
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() && self.is_test_file(entry.path()) => {
                    files.push(entry.into_path());
                }
                Ok(_) => {}
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    warnings.push(DiscoveryWarning::Unreadable {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }
        files
    }
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}
