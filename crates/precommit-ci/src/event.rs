//! Triggering event payload.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ActionError, Result};

/// Repository the pull request's head branch lives in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeadRepo {
    /// HTTPS clone URL.
    pub clone_url: String,
}

/// Head side of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequestHead {
    /// Source branch name.
    #[serde(rename = "ref")]
    pub ref_name: String,

    pub repo: HeadRepo,
}

/// The part of a pull request payload the fix-and-push step needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PullRequest {
    pub head: PullRequestHead,
}

impl PullRequest {
    pub fn new(branch: &str, clone_url: &str) -> Self {
        Self {
            head: PullRequestHead {
                ref_name: branch.to_string(),
                repo: HeadRepo {
                    clone_url: clone_url.to_string(),
                },
            },
        }
    }

    pub fn branch(&self) -> &str {
        &self.head.ref_name
    }

    pub fn clone_url(&self) -> &str {
        &self.head.repo.clone_url
    }
}

/// Event that triggered the run. Only pull request events carry `pull_request`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventContext {
    #[serde(default)]
    pub pull_request: Option<PullRequest>,
}

impl EventContext {
    /// Parse an event payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        serde_json::from_str(payload).map_err(|e| ActionError::Event(e.to_string()))
    }

    /// Load the payload file written by the runner.
    ///
    /// A missing file yields an empty context, as for events run outside CI.
    pub fn from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(payload) => Self::from_json(&payload),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "event payload not found");
                Ok(Self::default())
            }
            Err(e) => Err(ActionError::Event(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Load from an optional path (`GITHUB_EVENT_PATH`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn pull_request(&self) -> Option<&PullRequest> {
        self.pull_request.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PR_EVENT: &str = r#"{
        "action": "synchronize",
        "number": 7,
        "pull_request": {
            "number": 7,
            "head": {
                "ref": "feature/fix-lint",
                "sha": "0123456789abcdef0123456789abcdef01234567",
                "repo": {
                    "full_name": "octo/widgets",
                    "clone_url": "https://github.com/octo/widgets.git"
                }
            },
            "base": { "ref": "main" }
        }
    }"#;

    #[test]
    fn test_parse_pull_request_event() {
        let ctx = EventContext::from_json(PR_EVENT).unwrap();
        let pr = ctx.pull_request().expect("pull request");
        assert_eq!(pr.branch(), "feature/fix-lint");
        assert_eq!(pr.clone_url(), "https://github.com/octo/widgets.git");
    }

    #[test]
    fn test_push_event_has_no_pull_request() {
        let ctx = EventContext::from_json(r#"{"ref": "refs/heads/main", "after": "abc"}"#).unwrap();
        assert!(ctx.pull_request().is_none());
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(matches!(
            EventContext::from_json("{not json"),
            Err(ActionError::Event(_))
        ));
    }

    #[test]
    fn test_missing_event_file_is_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = EventContext::from_path(&dir.path().join("event.json")).unwrap();
        assert_eq!(ctx, EventContext::default());
        assert_eq!(EventContext::load(None).unwrap(), EventContext::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        std::fs::write(&path, PR_EVENT).unwrap();
        let ctx = EventContext::load(Some(&path)).unwrap();
        assert!(ctx.pull_request().is_some());
    }
}
