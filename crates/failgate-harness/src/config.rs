//! Session configuration.
//!
//! Every field can be set with builder methods or taken from the environment
//! via [`SessionConfig::from_env`]:
//! - `FAILGATE_RUN_ID`: run identifier embedded in log trace ids and reports
//! - `FAILGATE_FILTER`: only run cases whose `suite.name` contains this text
//! - `FAILGATE_LOG`: write the JSONL structured log to this path
//!
//! Empty values count as unset.

use std::path::PathBuf;

pub const DEFAULT_RUN_ID: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub run_id: String,
    pub filter: Option<String>,
    pub log_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            run_id: DEFAULT_RUN_ID.to_string(),
            filter: None,
            log_path: None,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `FAILGATE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();
        if let Some(run_id) = read("FAILGATE_RUN_ID") {
            config.run_id = run_id;
        }
        config.filter = read("FAILGATE_FILTER");
        config.log_path = read("FAILGATE_LOG").map(PathBuf::from);
        config
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Whether the case `suite.name` passes the filter.
    #[must_use]
    pub fn selects(&self, case_id: &str) -> bool {
        self.filter
            .as_deref()
            .is_none_or(|needle| case_id.contains(needle))
    }
}
