use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HostError, Result};

pub const ENV_LIBRARY: &str = "MPSSE_LIBRARY";
pub const ENV_BLOCKING_THREADS: &str = "MPSSE_BLOCKING_THREADS";
pub const ENV_LOG: &str = "MPSSE_LOG";

/// Host configuration.
///
/// Loaded from JSON, then overridden from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to libmpsse. `None` uses the platform default name.
    pub library: Option<PathBuf>,
    /// Upper bound on threads running engine calls.
    pub blocking_threads: usize,
    /// Default tracing filter.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self { library: None, blocking_threads: 4, log_filter: "info".into() }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| {
            HostError::ConfigIo { path: path.to_path_buf(), source }
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by the `MPSSE_*` variable names.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(library) = lookup(ENV_LIBRARY) {
            self.library = Some(PathBuf::from(library));
        }
        if let Some(threads) = lookup(ENV_BLOCKING_THREADS) {
            self.blocking_threads = threads
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or(HostError::InvalidSetting {
                    field: "blocking_threads",
                    value: threads,
                })?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log_filter = filter;
        }
        Ok(self)
    }
}
