//! Lint run orchestration.
//!
//! A run installs the lint tool, restores its cache, lints the checkout and,
//! on a pull request with a push token, commits the tool's fixes back to the
//! pull request branch.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::args::split_args;
use crate::cache::CacheService;
use crate::cache_key::{compute_cache_key, CacheKey};
use crate::error::{ActionError, Result};
use crate::event::{EventContext, PullRequest};
use crate::exec::{CommandRunner, CommandSpec};
use crate::git::{authenticated_url, GitRepo, COMMIT_MESSAGE, COMMIT_USER_EMAIL, COMMIT_USER_NAME};
use crate::inputs::ActionInputs;
use crate::tools::ToolSet;
use crate::workflow::{self, LogGroup};

/// Progress of the fix-and-push step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Start,
    NoChanges,
    HasChanges,
    ConfiguredIdentity,
    BranchCreated,
    Committed,
    Pushed,
}

impl PushState {
    fn advance(&mut self, next: PushState) {
        debug!(from = ?*self, to = ?next, "push state");
        *self = next;
    }
}

/// How the run ended for the fix-and-push step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    /// The first lint run passed.
    Clean,
    /// Lint failed, but the re-run left nothing to commit.
    NoChanges,
    /// Fixes were committed and pushed to `branch`.
    Pushed { branch: String },
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub cache_key: CacheKey,

    /// Whether a cache entry was restored.
    pub cache_restored: bool,

    /// Whether a cache entry was saved by this run.
    pub cache_saved: bool,

    /// Exit code of the first lint run.
    pub lint_exit_code: i32,

    pub fix: FixOutcome,
}

/// Runs the lint flow against one checkout.
pub struct LintRunner<'a> {
    runner: &'a dyn CommandRunner,
    cache: &'a dyn CacheService,
    tools: ToolSet,
}

impl<'a> LintRunner<'a> {
    pub fn new(runner: &'a dyn CommandRunner, cache: &'a dyn CacheService) -> Self {
        Self {
            runner,
            cache,
            tools: ToolSet::default(),
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    /// Execute the whole flow. Any error fails the run.
    pub async fn run(&self, inputs: &ActionInputs, event: &EventContext) -> Result<RunReport> {
        let extra_args = split_args(&inputs.extra_args)?;
        let lint = self
            .tools
            .lint(&inputs.config, &extra_args)
            .in_dir(&inputs.workspace);

        let token = inputs.token.as_deref();
        let pull_request = event.pull_request();
        let push_eligible = token.is_some() && pull_request.is_some();
        if let Some(token) = token {
            workflow::add_mask(token);
        }

        self.install().await?;

        let cache_paths = inputs.cache_paths();
        let cache_key = self.cache_key(inputs).await?;
        let cache_restored = self.restore_cache(&cache_paths, &cache_key).await;

        let first = self
            .runner
            .run(&lint.clone().tolerating(push_eligible))
            .await?;

        let cache_saved = if cache_restored {
            false
        } else {
            self.save_cache(&cache_paths, &cache_key).await
        };

        info!(exit_code = first.exit_code, push_eligible, "lint finished");

        let fix = if first.passed() {
            FixOutcome::Clean
        } else {
            match (token, pull_request) {
                (Some(token), Some(pr)) => self.fix_and_push(&lint, inputs, token, pr).await?,
                // A strict run has already returned the failure.
                _ => {
                    return Err(ActionError::CommandFailed {
                        command: lint.to_string(),
                        exit_code: first.exit_code,
                    })
                }
            }
        };

        Ok(RunReport {
            cache_key,
            cache_restored,
            cache_saved,
            lint_exit_code: first.exit_code,
            fix,
        })
    }

    /// Compute the cache key for `inputs` with the configured interpreter.
    pub async fn cache_key(&self, inputs: &ActionInputs) -> Result<CacheKey> {
        compute_cache_key(self.runner, &self.tools, &inputs.config_file()).await
    }

    async fn install(&self) -> Result<()> {
        let _group = LogGroup::start("install pre-commit");
        self.runner.run(&self.tools.install()).await?;
        self.runner.run(&self.tools.freeze()).await?;
        Ok(())
    }

    async fn restore_cache(&self, paths: &[PathBuf], key: &CacheKey) -> bool {
        match self.cache.restore(paths, key).await {
            Ok(restored) => restored,
            Err(e) => {
                warn!("Failed to restore cache: {e}");
                false
            }
        }
    }

    async fn save_cache(&self, paths: &[PathBuf], key: &CacheKey) -> bool {
        match self.cache.save(paths, key).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save cache: {e}");
                false
            }
        }
    }

    async fn fix_and_push(
        &self,
        lint: &CommandSpec,
        inputs: &ActionInputs,
        token: &str,
        pr: &PullRequest,
    ) -> Result<FixOutcome> {
        // Pushes made with the job token do not trigger new workflow runs, so
        // the tree has to pass here before anything is pushed.
        self.runner.run(&lint.clone().tolerating(false)).await?;

        let repo = GitRepo::new(self.runner, &self.tools.git, &inputs.workspace);
        let mut state = PushState::Start;

        if !repo.has_changes().await? {
            state.advance(PushState::NoChanges);
            info!("lint fixes match the committed tree; nothing to push");
            return Ok(FixOutcome::NoChanges);
        }
        state.advance(PushState::HasChanges);
        let remote = authenticated_url(pr.clone_url(), token)?;

        let _group = LogGroup::start("push fixes");
        repo.configure_identity(COMMIT_USER_NAME, COMMIT_USER_EMAIL)
            .await?;
        state.advance(PushState::ConfiguredIdentity);

        repo.checkout_branch(pr.branch()).await?;
        state.advance(PushState::BranchCreated);

        repo.commit_all(COMMIT_MESSAGE).await?;
        state.advance(PushState::Committed);

        repo.push_head(&remote, token).await?;
        state.advance(PushState::Pushed);

        info!(branch = %pr.branch(), "pushed lint fixes");
        Ok(FixOutcome::Pushed {
            branch: pr.branch().to_string(),
        })
    }
}
