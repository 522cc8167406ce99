//! Git operations for pushing auto-fixes back to a pull request.

use std::path::PathBuf;

use crate::error::{ActionError, Result};
use crate::exec::{CommandRunner, CommandSpec};

/// Identity used for fix commits.
pub const COMMIT_USER_NAME: &str = "pre-commit";
pub const COMMIT_USER_EMAIL: &str = "pre-commit@example.com";

/// Message of the fix commit.
pub const COMMIT_MESSAGE: &str = "pre-commit fixes";

/// Embed `token` into an HTTPS clone URL as an inline credential.
pub fn authenticated_url(clone_url: &str, token: &str) -> Result<String> {
    let rest = clone_url
        .strip_prefix("https://")
        .ok_or_else(|| ActionError::InvalidCloneUrl(clone_url.to_string()))?;
    Ok(format!("https://x-access-token:{token}@{rest}"))
}

/// A working tree driven through the `git` binary.
pub struct GitRepo<'a> {
    runner: &'a dyn CommandRunner,
    git: String,
    dir: PathBuf,
}

impl<'a> GitRepo<'a> {
    pub fn new(runner: &'a dyn CommandRunner, git: &str, dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            git: git.to_string(),
            dir: dir.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(&self.git, args).in_dir(&self.dir)
    }

    /// Whether the working tree differs from the index (`git diff --quiet`).
    pub async fn has_changes(&self) -> Result<bool> {
        let outcome = self
            .runner
            .run(&self.command(["diff", "--quiet"]).tolerating(true))
            .await?;
        Ok(!outcome.passed())
    }

    /// Set the committer name and email for this repository.
    pub async fn configure_identity(&self, name: &str, email: &str) -> Result<()> {
        self.runner
            .run(&self.command(["config", "user.name", name]))
            .await?;
        self.runner
            .run(&self.command(["config", "user.email", email]))
            .await?;
        Ok(())
    }

    /// Create `branch` at the current commit and switch to it.
    pub async fn checkout_branch(&self, branch: &str) -> Result<()> {
        self.runner
            .run(&self.command(["checkout", "HEAD", "-b", branch]))
            .await?;
        Ok(())
    }

    /// Commit every tracked modification.
    pub async fn commit_all(&self, message: &str) -> Result<()> {
        self.runner
            .run(&self.command(["commit", "-am", message]))
            .await?;
        Ok(())
    }

    /// Push `HEAD` to `remote`, an authenticated URL embedding `token`.
    pub async fn push_head(&self, remote: &str, token: &str) -> Result<()> {
        self.runner
            .run(
                &self
                    .command(["push".to_string(), remote.to_string(), "HEAD".to_string()])
                    .redact(token),
            )
            .await?;
        Ok(())
    }
}
