//! Error types for precommit-ci

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can abort a lint run.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The program could not be started at all
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited non-zero where that was not tolerated
    #[error("command `{command}` failed with exit code {exit_code}")]
    CommandFailed { command: String, exit_code: i32 },

    /// Interpreter introspection exited non-zero
    #[error("python version check failed: {0}")]
    InterpreterProbe(String),

    /// The lint configuration file could not be read
    #[error("failed to read config file {}: {}", .path.display(), .source)]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `extra_args` could not be tokenized
    #[error("invalid extra_args: {0}")]
    InvalidArgs(String),

    /// The triggering event payload could not be loaded
    #[error("invalid event payload: {0}")]
    Event(String),

    /// The pull request clone URL cannot carry an inline credential
    #[error("clone URL is not an https URL: {0}")]
    InvalidCloneUrl(String),

    /// Neither PRE_COMMIT_HOME nor HOME is set
    #[error("cannot locate the pre-commit cache directory: HOME is not set")]
    MissingHome,

    /// Cache service rejected a request
    #[error("cache service error: {0}")]
    Cache(String),

    /// HTTP transport error talking to the cache service
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ActionError {
    fn from(err: reqwest::Error) -> Self {
        ActionError::Http(err.to_string())
    }
}

/// Result type for precommit-ci operations.
pub type Result<T> = std::result::Result<T, ActionError>;
