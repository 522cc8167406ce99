//! precommit-ci - pre-commit as a CI step
//!
//! Runs `pre-commit` against a checkout with:
//! - A content-addressed cache of the hook environments
//! - Explicit per-command failure tolerance
//! - Fix commits pushed back to the pull request branch when a token is given

pub mod args;
pub mod cache;
pub mod cache_key;
pub mod error;
pub mod event;
pub mod exec;
pub mod fakes;
pub mod git;
pub mod inputs;
pub mod runner;
pub mod telemetry;
pub mod tools;
pub mod workflow;

// Re-export key types
pub use args::split_args;
pub use cache::{
    cache_service_from_env, home_cache_dir, ActionsCacheClient, ActionsCacheConfig, CacheProtocol,
    CacheService, DisabledCache,
};
pub use cache_key::{CacheKey, CACHE_KEY_PREFIX};
pub use error::{ActionError, Result};
pub use event::{EventContext, PullRequest};
pub use exec::{CommandRunner, CommandSpec, ExecOutcome, OutputMode, ProcessRunner};
pub use git::GitRepo;
pub use inputs::ActionInputs;
pub use runner::{FixOutcome, LintRunner, PushState, RunReport};
pub use telemetry::init_tracing;
pub use tools::ToolSet;
