//! In-memory fakes for the command runner and cache service (testing only)
//!
//! Provides `ScriptedRunner` and `MemoryCache`, which satisfy the trait
//! contracts without spawning processes or talking to a cache service.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::CacheService;
use crate::cache_key::CacheKey;
use crate::error::{ActionError, Result};
use crate::exec::{CommandRunner, CommandSpec, ExecOutcome};

// ---------------------------------------------------------------------------
// ScriptedRunner
// ---------------------------------------------------------------------------

/// Command runner that answers from a script and records every call.
///
/// Responses are keyed by `"program subcommand"` (e.g. `"git diff"`) or by
/// `"program"` alone; the more specific key wins. Queued responses are
/// consumed in order and the last one repeats. Unscripted commands exit 0.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<HashMap<String, VecDeque<ExecOutcome>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `outcome` for commands matching `key`.
    pub fn respond(self, key: &str, outcome: ExecOutcome) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    /// Queue a bare exit code for commands matching `key`.
    pub fn exit(self, key: &str, exit_code: i32) -> Self {
        self.respond(key, ExecOutcome::with_code(exit_code))
    }

    /// Every command executed so far, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of executed commands matching `key`.
    pub fn count(&self, key: &str) -> usize {
        self.calls()
            .iter()
            .filter(|spec| matches_key(spec, key))
            .count()
    }

    fn next_outcome(&self, spec: &CommandSpec) -> ExecOutcome {
        let mut script = self.script.lock().unwrap();
        let specific = spec
            .subcommand()
            .map(|sub| format!("{} {}", spec.program, sub));
        let key = match specific {
            Some(k) if script.get(&k).is_some_and(|q| !q.is_empty()) => k,
            _ => spec.program.clone(),
        };

        match script.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => ExecOutcome::default(),
        }
    }
}

fn matches_key(spec: &CommandSpec, key: &str) -> bool {
    match key.split_once(' ') {
        Some((program, sub)) => spec.program == program && spec.subcommand() == Some(sub),
        None => spec.program == key,
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, spec: &CommandSpec) -> Result<ExecOutcome> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok(self.next_outcome(spec))
    }
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

/// A recorded cache-service request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCall {
    pub paths: Vec<PathBuf>,
    pub key: String,
}

/// Cache service that holds keys in memory and records every request.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<Vec<String>>,
    unavailable: bool,
    restores: Mutex<Vec<CacheCall>>,
    saves: Mutex<Vec<CacheCall>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate an entry so `restore` hits.
    pub fn with_entry(self, key: &CacheKey) -> Self {
        self.entries.lock().unwrap().push(key.as_str().to_string());
        self
    }

    /// Make every request fail as if the service were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn restores(&self) -> Vec<CacheCall> {
        self.restores.lock().unwrap().clone()
    }

    pub fn saves(&self) -> Vec<CacheCall> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn restore(&self, paths: &[PathBuf], key: &CacheKey) -> Result<bool> {
        self.restores.lock().unwrap().push(CacheCall {
            paths: paths.to_vec(),
            key: key.as_str().to_string(),
        });
        if self.unavailable {
            return Err(ActionError::Cache("service unavailable".to_string()));
        }
        Ok(self.entries.lock().unwrap().iter().any(|k| k == key.as_str()))
    }

    async fn save(&self, paths: &[PathBuf], key: &CacheKey) -> Result<()> {
        self.saves.lock().unwrap().push(CacheCall {
            paths: paths.to_vec(),
            key: key.as_str().to_string(),
        });
        if self.unavailable {
            return Err(ActionError::Cache("service unavailable".to_string()));
        }
        self.entries.lock().unwrap().push(key.as_str().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_runner_queue_then_repeat() {
        let runner = ScriptedRunner::new()
            .exit("pre-commit", 1)
            .exit("pre-commit", 0);
        let spec = CommandSpec::new("pre-commit", ["run"]);
        assert_eq!(runner.execute(&spec).await.unwrap().exit_code, 1);
        assert_eq!(runner.execute(&spec).await.unwrap().exit_code, 0);
        assert_eq!(runner.execute(&spec).await.unwrap().exit_code, 0);
        assert_eq!(runner.count("pre-commit"), 3);
    }

    #[tokio::test]
    async fn test_scripted_runner_specific_key_wins() {
        let runner = ScriptedRunner::new().exit("git", 0).exit("git diff", 1);
        let diff = CommandSpec::new("git", ["diff", "--quiet"]);
        let push = CommandSpec::new("git", ["push", "url", "HEAD"]);
        assert_eq!(runner.execute(&diff).await.unwrap().exit_code, 1);
        assert_eq!(runner.execute(&push).await.unwrap().exit_code, 0);
        assert_eq!(runner.count("git diff"), 1);
        assert_eq!(runner.count("git push"), 1);
        assert_eq!(runner.count("git"), 2);
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        let key = CacheKey::derive("py", b"cfg");
        let paths = vec![PathBuf::from("/home/runner/.cache/pre-commit")];
        assert!(!cache.restore(&paths, &key).await.unwrap());
        cache.save(&paths, &key).await.unwrap();
        assert!(cache.restore(&paths, &key).await.unwrap());
        assert_eq!(cache.saves().len(), 1);
        assert_eq!(cache.restores().len(), 2);
    }
}
