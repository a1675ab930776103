use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{
    CompileConfig, FileExtension, Instrument, Language, Placeholders, RunConfig, SourceNaming,
    Toolchain,
};

pub mod language;
mod loader;

/// Example configuration embedded at compile time.
///
/// Library users can access this to generate a starter config file.
pub const EXAMPLE_CONFIG: &str = include_str!("../../coderun.example.toml");

/// Largest accepted value, in seconds, for `deadline`, `kill_grace` and
/// `probe_timeout` (one week)
pub const MAX_SECONDS: f64 = 7.0 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to read config file at {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("language '{0}' not found in configuration")]
    LanguageNotFound(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Config for coderun
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root directory under which per-job directories are created.
    /// Defaults to `<system temp dir>/coderun`.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// Wall clock budget in seconds for a whole job, from the first stage
    /// launch until the last stage finishes
    #[serde(default = "default_deadline")]
    pub deadline: f64,

    /// Seconds to wait for a killed process to be reaped, and for output
    /// streams to close after a process exited
    #[serde(default = "default_kill_grace")]
    pub kill_grace: f64,

    /// Seconds a toolchain probe may take before it counts as failed
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: f64,

    /// Remember successful toolchain probes for the lifetime of a runner
    #[serde(default = "default_true")]
    pub cache_probes: bool,

    /// Maximum bytes captured per output stream of a stage
    #[serde(default = "default_max_output")]
    pub max_output: usize,

    /// Upper bound on jobs running at the same time (unbounded if unset)
    #[serde(default)]
    pub max_concurrent_jobs: Option<usize>,

    /// Language configurations keyed by language ID
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

impl Config {
    /// Create a new config with embedded default languages
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty config with no languages
    pub fn empty() -> Self {
        Self {
            work_dir: None,
            deadline: default_deadline(),
            kill_grace: default_kill_grace(),
            probe_timeout: default_probe_timeout(),
            cache_probes: true,
            max_output: default_max_output(),
            max_concurrent_jobs: None,
            languages: HashMap::new(),
        }
    }

    /// Get a language by ID
    pub fn get_language(&self, id: &str) -> Result<&Language, ConfigError> {
        self.languages
            .get(id)
            .ok_or_else(|| ConfigError::LanguageNotFound(id.to_string()))
    }

    /// Directory under which job directories are created
    pub fn work_root(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("coderun"))
    }

    pub fn deadline(&self) -> Duration {
        seconds(self.deadline)
    }

    pub fn kill_grace(&self) -> Duration {
        seconds(self.kill_grace)
    }

    pub fn probe_timeout(&self) -> Duration {
        seconds(self.probe_timeout)
    }
}

/// Saturating conversion for configs that skipped validation
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_deadline() -> f64 {
    10.0
}

fn default_kill_grace() -> f64 {
    1.0
}

fn default_probe_timeout() -> f64 {
    5.0
}

fn default_max_output() -> usize {
    8 * 1024 * 1024
}

fn default_true() -> bool {
    true
}
