//! Runtime configuration.
//!
//! # Responsibility
//! - Describe the knobs an embedding process sets for the overlay engine.
//! - Load them from TOML with defaults for every missing key.
//!
//! # Invariants
//! - Loading never panics; parse and IO failures are returned as errors.

use crate::logging::default_log_level;
use crate::service::loaders::LoaderPolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE_FILE: &str = "draftpages.sqlite3";
const DEFAULT_REGION_CONCURRENCY: usize = 4;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DraftPagesConfig {
    /// SQLite database file.
    pub database_path: PathBuf,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files; unset disables file logs.
    pub log_dir: Option<PathBuf>,
    /// Regions of one page that may load concurrently.
    pub region_concurrency: usize,
    /// Cap on rows returned by the drafts listing.
    pub list_drafts_limit: Option<u32>,
}

impl Default for DraftPagesConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            log_level: default_log_level().to_string(),
            log_dir: None,
            region_concurrency: DEFAULT_REGION_CONCURRENCY,
            list_drafts_limit: None,
        }
    }
}

impl DraftPagesConfig {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    /// Reads and parses a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loader policy derived from `region_concurrency`.
    pub fn loader_policy(&self) -> LoaderPolicy {
        LoaderPolicy::with_concurrency(self.region_concurrency)
    }
}

/// Configuration load failure.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}
