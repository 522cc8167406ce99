//! Cache key derivation.
//!
//! The key is `pre-commit-2-<sha256(interpreter identity)>-<sha256(config)>`.
//! Changing the interpreter or the config file changes the key, so a cache
//! built by another Python or for other hooks is never restored.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ActionError, Result};
use crate::exec::CommandRunner;
use crate::tools::ToolSet;

/// Version tag of the cached directory layout. Bump when its shape changes.
pub const CACHE_KEY_PREFIX: &str = "pre-commit-2";

/// Content-derived cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key from the interpreter identity and config file contents.
    pub fn derive(interpreter_identity: &str, config_contents: &[u8]) -> Self {
        Self(format!(
            "{}-{}-{}",
            CACHE_KEY_PREFIX,
            sha256_hex(interpreter_identity.as_bytes()),
            sha256_hex(config_contents)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of `data`, hex encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Ask the interpreter for its executable path and version.
pub async fn interpreter_identity(runner: &dyn CommandRunner, tools: &ToolSet) -> Result<String> {
    let spec = tools.python_identity().tolerating(true);
    let outcome = runner.run(&spec).await.map_err(|e| match e {
        ActionError::Spawn { source, .. } => ActionError::InterpreterProbe(source.to_string()),
        other => other,
    })?;
    if !outcome.passed() {
        return Err(ActionError::InterpreterProbe(format!(
            "`{}` exited with code {}: {}",
            spec,
            outcome.exit_code,
            outcome.stderr.trim()
        )));
    }
    Ok(outcome.stdout)
}

/// Read the config file fully.
pub async fn read_config(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ActionError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })
}

/// Compute the cache key for the current interpreter and config file.
pub async fn compute_cache_key(
    runner: &dyn CommandRunner,
    tools: &ToolSet,
    config_path: &Path,
) -> Result<CacheKey> {
    let identity = interpreter_identity(runner, tools).await?;
    let config = read_config(config_path).await?;
    let key = CacheKey::derive(&identity, &config);
    debug!(key = %key, "computed cache key");
    Ok(key)
}
