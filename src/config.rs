//! Configuration resolution: built-in defaults, then `.checkrun.toml`, then command-line overrides.
//!
//! The config file is searched upward from the starting directory. A directory is checked for the config file
//! before its boundary markers, so a config living next to `flake.lock` or `.git` is still found, but nothing
//! above a boundary is ever read.
//!
//! ## Example
//!
//! ```toml
//! [runner]
//! num-threads = 4
//! timeout = 30000
//!
//! [report]
//! format = "json"
//!
//! [evaluator]
//! library = "./lib"
//!
//! [discovery]
//! suffix = "_test.nix"
//! ```

use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};

use clap::ValueEnum;
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name searched for in each directory.
pub const CONFIG_FILE_NAME: &str = ".checkrun.toml";

/// Entries that mark a project root and stop the upward search.
pub const BOUNDARY_MARKERS: &[&str] = &["flake.lock", ".git"];

/// Environment variable holding the checking-library path.
pub const LIBRARY_ENV_VAR: &str = "CHECKRUN_LIB_PATH";

pub const DEFAULT_PROGRAM: &str = "nix-instantiate";
pub const DEFAULT_ATTRIBUTE: &str = "tests";
pub const DEFAULT_SUFFIX: &str = "_test.nix";

/// Placeholder replaced by the file under evaluation.
pub const FILE_PLACEHOLDER: &str = "{file}";
/// Placeholder replaced by `evaluator.library`.
pub const LIBRARY_PLACEHOLDER: &str = "{library}";
/// Placeholder replaced by `evaluator.attribute`.
pub const ATTRIBUTE_PLACEHOLDER: &str = "{attribute}";

// ============================================================================
// Effective configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ColorChoice {
    /// Color when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

/// Resolved run parameters. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub runner: RunnerConfig,
    pub report: ReportConfig,
    pub evaluator: EvaluatorConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    pub num_threads: NonZeroUsize,
    /// Per-file deadline in milliseconds; `0` disables it.
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    pub format: OutputFormat,
    pub color: ColorChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EvaluatorConfig {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    pub attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    pub suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runner: RunnerConfig {
                num_threads: default_num_threads(),
                timeout: 0,
            },
            report: ReportConfig {
                format: OutputFormat::default(),
                color: ColorChoice::default(),
            },
            evaluator: EvaluatorConfig {
                program: DEFAULT_PROGRAM.to_string(),
                args: default_args(),
                library: None,
                attribute: DEFAULT_ATTRIBUTE.to_string(),
            },
            discovery: DiscoveryConfig {
                suffix: DEFAULT_SUFFIX.to_string(),
            },
        }
    }
}

fn default_num_threads() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// `nix-instantiate --eval --strict --json <file> --arg nix-tests "import <library> {}" -A <attribute>`
fn default_args() -> Vec<String> {
    [
        "--eval",
        "--strict",
        "--json",
        FILE_PLACEHOLDER,
        "--arg",
        "nix-tests",
        "import {library} {}",
        "-A",
        ATTRIBUTE_PLACEHOLDER,
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

// ============================================================================
// Layers
// ============================================================================

/// Contents of a config file. Every key is optional; unknown keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    #[serde(default)]
    pub runner: FileRunnerConfig,
    #[serde(default)]
    pub report: FileReportConfig,
    #[serde(default)]
    pub evaluator: FileEvaluatorConfig,
    #[serde(default)]
    pub discovery: FileDiscoveryConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunnerConfig {
    pub num_threads: Option<toml::Spanned<usize>>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileReportConfig {
    pub format: Option<OutputFormat>,
    pub color: Option<ColorChoice>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileEvaluatorConfig {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub library: Option<String>,
    pub attribute: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileDiscoveryConfig {
    pub suffix: Option<String>,
}

/// Values given on the command line. `None` leaves the lower layer in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub num_threads: Option<NonZeroUsize>,
    pub timeout: Option<u64>,
    pub format: Option<OutputFormat>,
    pub color: Option<ColorChoice>,
    pub program: Option<String>,
    /// Replaces the whole argument template when set.
    pub args: Option<Vec<String>>,
    pub library: Option<String>,
    pub attribute: Option<String>,
    pub suffix: Option<String>,
}

/// A parsed config file together with the text it came from, for diagnostics.
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub source: String,
    pub contents: FileConfig,
}

/// The effective configuration and the file it was read from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub config: Config,
    pub source: Option<PathBuf>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("config path `{}` does not exist", path.display())]
    #[diagnostic(code(checkrun::config::not_found))]
    NotFound { path: PathBuf },

    #[error("failed to read config file `{}`", path.display())]
    #[diagnostic(code(checkrun::config::io))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file `{}`: {message}", path.display())]
    #[diagnostic(code(checkrun::config::parse))]
    Parse {
        path: PathBuf,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: Option<SourceSpan>,
    },

    #[error("invalid value for `{key}` in `{}`: {message}", path.display())]
    #[diagnostic(code(checkrun::config::invalid_value))]
    InvalidValue {
        path: PathBuf,
        key: &'static str,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{message}")]
        span: Option<SourceSpan>,
    },

    #[error("evaluator arguments reference {{library}} but no checking library is configured")]
    #[diagnostic(
        code(checkrun::config::missing_library),
        help("set `evaluator.library` in .checkrun.toml, pass --library, or export CHECKRUN_LIB_PATH")
    )]
    MissingLibrary,
}

// ============================================================================
// Resolution
// ============================================================================

impl Config {
    /// Resolve the effective configuration.
    ///
    /// ## Parameters
    ///
    /// - `explicit`: a config file, or a directory to start the search from
    /// - `start_dir`: where the search starts when `explicit` is `None`
    /// - `overrides`: command-line values, applied last
    pub fn resolve(
        explicit: Option<&Path>,
        start_dir: &Path,
        overrides: &ConfigOverrides,
    ) -> Result<ResolvedConfig, ConfigError> {
        let location = locate(explicit, start_dir)?;
        let mut config = Config::default();
        if let Some(path) = &location {
            let loaded = load(path)?;
            config.apply_file(&loaded)?;
        }
        config.apply_overrides(overrides);
        tracing::debug!(source = ?location, "resolved configuration");
        Ok(ResolvedConfig {
            config,
            source: location,
        })
    }

    /// Merge a config file on top of this configuration.
    pub fn apply_file(&mut self, loaded: &LoadedFile) -> Result<(), ConfigError> {
        let file = &loaded.contents;

        if let Some(spanned) = &file.runner.num_threads {
            self.runner.num_threads = NonZeroUsize::new(*spanned.get_ref()).ok_or_else(|| {
                ConfigError::InvalidValue {
                    path: loaded.path.clone(),
                    key: "runner.num-threads",
                    message: "must be at least 1".to_string(),
                    src: named_source(&loaded.path, &loaded.source),
                    span: Some(SourceSpan::from(spanned.span())),
                }
            })?;
        }
        if let Some(timeout) = file.runner.timeout {
            self.runner.timeout = timeout;
        }
        if let Some(format) = file.report.format {
            self.report.format = format;
        }
        if let Some(color) = file.report.color {
            self.report.color = color;
        }
        if let Some(program) = &file.evaluator.program {
            self.evaluator.program = program.clone();
        }
        if let Some(args) = &file.evaluator.args {
            self.evaluator.args = args.clone();
        }
        if let Some(library) = &file.evaluator.library {
            self.evaluator.library = Some(library.clone());
        }
        if let Some(attribute) = &file.evaluator.attribute {
            self.evaluator.attribute = attribute.clone();
        }
        if let Some(suffix) = &file.discovery.suffix {
            self.discovery.suffix = suffix.clone();
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(num_threads) = overrides.num_threads {
            self.runner.num_threads = num_threads;
        }
        if let Some(timeout) = overrides.timeout {
            self.runner.timeout = timeout;
        }
        if let Some(format) = overrides.format {
            self.report.format = format;
        }
        if let Some(color) = overrides.color {
            self.report.color = color;
        }
        if let Some(program) = &overrides.program {
            self.evaluator.program = program.clone();
        }
        if let Some(args) = &overrides.args {
            self.evaluator.args = args.clone();
        }
        if let Some(library) = &overrides.library {
            self.evaluator.library = Some(library.clone());
        }
        if let Some(attribute) = &overrides.attribute {
            self.evaluator.attribute = attribute.clone();
        }
        if let Some(suffix) = &overrides.suffix {
            self.discovery.suffix = suffix.clone();
        }
    }

    /// Check the cross-field rules that only matter when tests are about to run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let needs_library = self.evaluator.args.iter().any(|arg| arg.contains(LIBRARY_PLACEHOLDER));
        if needs_library && self.evaluator.library.is_none() {
            return Err(ConfigError::MissingLibrary);
        }
        Ok(())
    }

    /// Render the configuration as a TOML document.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Decide which config file, if any, applies.
///
/// ## Returns
///
/// - `Ok(Some(path))` for an explicit file or a file found by the search
/// - `Ok(None)` when the search reached a boundary or the filesystem root
/// - `Err(ConfigError::NotFound)` when `explicit` does not exist
pub fn locate(explicit: Option<&Path>, start_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    match explicit {
        Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
        Some(path) if path.is_dir() => Ok(find_config_file(path)),
        Some(path) => Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        }),
        None => Ok(find_config_file(start_dir)),
    }
}

/// Search `start` and its ancestors for [`CONFIG_FILE_NAME`], stopping at the first project boundary.
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let start = normalize_lexically(start);
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if is_project_boundary(dir) {
            tracing::debug!(boundary = %dir.display(), "config search stopped at project boundary");
            return None;
        }
    }
    None
}

/// Absolute form of `path` with `.` and `..` folded away, so `ancestors()` only ever walks upward.
fn normalize_lexically(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

pub fn is_project_boundary(dir: &Path) -> bool {
    BOUNDARY_MARKERS.iter().any(|marker| dir.join(marker).exists())
}

/// Read and parse a config file.
pub fn load(path: &Path) -> Result<LoadedFile, ConfigError> {
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let contents = parse(path, &source)?;
    Ok(LoadedFile {
        path: path.to_path_buf(),
        source,
        contents,
    })
}

/// Parse config text. `path` is used only for diagnostics.
pub fn parse(path: &Path, source: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(source).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        message: err.message().to_string(),
        src: named_source(path, source),
        span: err.span().map(SourceSpan::from),
    })
}

fn named_source(path: &Path, source: &str) -> NamedSource<String> {
    NamedSource::new(path.display().to_string(), source.to_string())
}

// ============================================================================
// Tests
// ============================================================================
