//! Action inputs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default lint configuration file.
pub const DEFAULT_CONFIG: &str = ".pre-commit-config.yaml";

/// Default arguments appended to the lint command.
pub const DEFAULT_EXTRA_ARGS: &str = "--all-files";

/// Values supplied to a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionInputs {
    /// Lint configuration path, relative to `workspace` unless absolute.
    pub config: PathBuf,

    /// Credential for pushing fixes. Never empty when set.
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// Extra lint arguments as one shell-style string.
    pub extra_args: String,

    /// Checkout every tool runs in.
    pub workspace: PathBuf,

    /// Directory holding the lint tool's hook environments.
    pub cache_dir: PathBuf,
}

impl ActionInputs {
    pub fn new(config: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: config.into(),
            token: None,
            extra_args: DEFAULT_EXTRA_ARGS.to_string(),
            workspace: PathBuf::from("."),
            cache_dir: cache_dir.into(),
        }
    }

    /// Set the push token; an empty string means no token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_extra_args(mut self, extra_args: &str) -> Self {
        self.extra_args = extra_args.to_string();
        self
    }

    pub fn in_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Where the config file is read from.
    pub fn config_file(&self) -> PathBuf {
        self.workspace.join(&self.config)
    }

    /// Paths handed to the cache service.
    pub fn cache_paths(&self) -> Vec<PathBuf> {
        vec![self.cache_dir.clone()]
    }
}
