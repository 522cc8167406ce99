//! Cache service clients
//!
//! The pre-commit hook environments are cached through the CI provider's
//! cache service. The client archives the cached directories with `tar` and
//! moves the archive over HTTP; it never stores anything itself.
//!
//! Two service generations exist. Current runners expose the results service
//! (`ACTIONS_RESULTS_URL`, twirp RPCs plus pre-signed blob URLs); older and
//! self-hosted runners expose `_apis/artifactcache` under `ACTIONS_CACHE_URL`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache_key::{sha256_hex, CacheKey};
use crate::error::{ActionError, Result};
use crate::exec::{CommandRunner, CommandSpec};

/// Compression recorded in the cache version.
const COMPRESSION: &str = "gzip";

/// Salt mixed into the cache version, as used by the cache service toolkit.
const VERSION_SALT: &str = "1.0";

/// Upload chunk size (32 MiB).
const UPLOAD_CHUNK_SIZE: usize = 32 * 1024 * 1024;

const ARCHIVE_NAME: &str = "cache.tgz";

const API_ACCEPT: &str = "application/json;api-version=6.0-preview.1";

const TWIRP_SERVICE: &str = "twirp/github.actions.results.api.v1.CacheService";

/// Restores and saves directories under a key.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Restore `paths` saved under `key`. Returns whether an entry was restored.
    async fn restore(&self, paths: &[PathBuf], key: &CacheKey) -> Result<bool>;

    /// Save `paths` under `key`.
    async fn save(&self, paths: &[PathBuf], key: &CacheKey) -> Result<()>;
}

/// The pre-commit cache directory under `$HOME`.
pub fn home_cache_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .ok_or(ActionError::MissingHome)?;
    Ok(PathBuf::from(home).join(".cache").join("pre-commit"))
}

/// Version string binding an entry to its path set and archive format.
pub fn cache_version(paths: &[PathBuf]) -> String {
    let mut components: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    components.push(COMPRESSION.to_string());
    components.push(VERSION_SALT.to_string());
    sha256_hex(components.join("|").as_bytes())
}

/// Which cache service generation the runner exposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheProtocol {
    /// `_apis/artifactcache` REST API
    Legacy,
    /// Results service twirp API
    Results,
}

/// Cache service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionsCacheConfig {
    /// Service base URL, ending in `/`
    pub base_url: String,
    /// Runtime bearer token
    pub token: String,
    pub protocol: CacheProtocol,
}

impl ActionsCacheConfig {
    /// Read the cache service settings from the runner environment.
    ///
    /// Returns `None` outside a runner that provides the cache service.
    pub fn from_env() -> Option<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Resolve the settings from `var`, a lookup of environment variables.
    ///
    /// The results service wins when `ACTIONS_CACHE_SERVICE_V2` is set or when
    /// only `ACTIONS_RESULTS_URL` is present.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |name: &str| var(name).filter(|v| !v.is_empty());
        let token = get("ACTIONS_RUNTIME_TOKEN")?;
        let results_url = get("ACTIONS_RESULTS_URL");
        let legacy_url = get("ACTIONS_CACHE_URL");
        let prefer_results = get("ACTIONS_CACHE_SERVICE_V2").is_some_and(|v| v != "false");

        match (results_url, legacy_url) {
            (Some(url), None) => Some(Self::results(&url, &token)),
            (Some(url), Some(_)) if prefer_results => Some(Self::results(&url, &token)),
            (_, Some(url)) => Some(Self::new(&url, &token)),
            (None, None) => None,
        }
    }

    /// Configuration for the `_apis/artifactcache` service.
    pub fn new(base_url: &str, token: &str) -> Self {
        Self::with_protocol(base_url, token, CacheProtocol::Legacy)
    }

    /// Configuration for the results service.
    pub fn results(base_url: &str, token: &str) -> Self {
        Self::with_protocol(base_url, token, CacheProtocol::Results)
    }

    fn with_protocol(base_url: &str, token: &str, protocol: CacheProtocol) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            token: token.to_string(),
            protocol,
        }
    }

    /// URL of an `_apis/artifactcache` resource.
    pub fn endpoint(&self, resource: &str) -> String {
        format!("{}_apis/artifactcache/{}", self.base_url, resource)
    }

    /// URL of a results service RPC.
    pub fn rpc_endpoint(&self, method: &str) -> String {
        format!("{}{}/{}", self.base_url, TWIRP_SERVICE, method)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactCacheEntry {
    #[serde(default)]
    cache_key: Option<String>,
    #[serde(default)]
    archive_location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReserveCacheRequest<'a> {
    key: &'a str,
    version: &'a str,
    cache_size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveCacheResponse {
    cache_id: i64,
}

#[derive(Debug, Serialize)]
struct CommitCacheRequest {
    size: u64,
}

#[derive(Debug, Serialize)]
struct GetDownloadUrlRequest<'a> {
    key: &'a str,
    restore_keys: Vec<&'a str>,
    version: &'a str,
}

#[derive(Debug, Deserialize)]
struct GetDownloadUrlResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    signed_download_url: String,
    #[serde(default)]
    matched_key: String,
}

#[derive(Debug, Serialize)]
struct CreateEntryRequest<'a> {
    key: &'a str,
    version: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateEntryResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    signed_upload_url: String,
}

#[derive(Debug, Serialize)]
struct FinalizeEntryRequest<'a> {
    key: &'a str,
    // int64 travels as a string in protobuf JSON
    size_bytes: String,
    version: &'a str,
}

#[derive(Debug, Deserialize)]
struct FinalizeEntryResponse {
    #[serde(default)]
    ok: bool,
}

/// HTTP client for the Actions cache service
pub struct ActionsCacheClient {
    config: ActionsCacheConfig,
    http_client: reqwest::Client,
    runner: Arc<dyn CommandRunner>,
    tar: String,
}

impl ActionsCacheClient {
    /// Create a new client; `runner` executes `tar`.
    pub fn new(config: ActionsCacheConfig, runner: Arc<dyn CommandRunner>, tar: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("precommit-action/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ActionsCacheClient {
            config,
            http_client,
            runner,
            tar: tar.to_string(),
        })
    }

    fn api(&self, method: Method, resource: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.config.endpoint(resource))
            .header(ACCEPT, API_ACCEPT)
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
    }

    async fn rpc<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .http_client
            .post(self.config.rpc_endpoint(method))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.token))
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ActionError::Cache(format!(
                "{method} failed with status {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn lookup(&self, key: &CacheKey, version: &str) -> Result<Option<String>> {
        match self.config.protocol {
            CacheProtocol::Legacy => self.lookup_legacy(key, version).await,
            CacheProtocol::Results => self.lookup_results(key, version).await,
        }
    }

    async fn lookup_results(&self, key: &CacheKey, version: &str) -> Result<Option<String>> {
        let entry: GetDownloadUrlResponse = self
            .rpc(
                "GetCacheEntryDownloadURL",
                &GetDownloadUrlRequest {
                    key: key.as_str(),
                    restore_keys: Vec::new(),
                    version,
                },
            )
            .await?;
        if !entry.ok || entry.signed_download_url.is_empty() {
            return Ok(None);
        }
        debug!(matched = %entry.matched_key, "cache lookup");
        Ok(Some(entry.signed_download_url))
    }

    async fn lookup_legacy(&self, key: &CacheKey, version: &str) -> Result<Option<String>> {
        let response = self
            .api(Method::GET, "cache")
            .query(&[("keys", key.as_str()), ("version", version)])
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ActionError::Cache(format!(
                "cache lookup failed with status {}",
                response.status()
            )));
        }

        let entry: ArtifactCacheEntry = response.json().await?;
        debug!(matched = ?entry.cache_key, "cache lookup");
        Ok(entry.archive_location)
    }

    async fn download(&self, location: &str, archive: &Path) -> Result<()> {
        // Archive locations are pre-signed; no service credentials are sent.
        let bytes = self
            .http_client
            .get(location)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tokio::fs::write(archive, &bytes).await?;
        Ok(())
    }

    /// Store `data` under `key`. Returns `false` if another job holds the entry.
    async fn store(&self, key: &CacheKey, version: &str, data: Vec<u8>) -> Result<bool> {
        match self.config.protocol {
            CacheProtocol::Legacy => {
                let Some(cache_id) = self.reserve(key, version, data.len() as u64).await? else {
                    return Ok(false);
                };
                self.upload(cache_id, &data).await?;
            }
            CacheProtocol::Results => {
                let created: CreateEntryResponse = self
                    .rpc(
                        "CreateCacheEntry",
                        &CreateEntryRequest {
                            key: key.as_str(),
                            version,
                        },
                    )
                    .await?;
                if !created.ok {
                    return Ok(false);
                }
                let size = data.len();
                self.upload_blob(&created.signed_upload_url, data).await?;

                let finalized: FinalizeEntryResponse = self
                    .rpc(
                        "FinalizeCacheEntryUpload",
                        &FinalizeEntryRequest {
                            key: key.as_str(),
                            size_bytes: size.to_string(),
                            version,
                        },
                    )
                    .await?;
                if !finalized.ok {
                    return Err(ActionError::Cache(format!(
                        "cache service did not finalize entry {key}"
                    )));
                }
            }
        }
        Ok(true)
    }

    async fn upload_blob(&self, signed_url: &str, data: Vec<u8>) -> Result<()> {
        debug!(bytes = data.len(), "uploading archive");
        // Pre-signed blob URL; no service credentials are sent.
        self.http_client
            .put(signed_url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn reserve(&self, key: &CacheKey, version: &str, size: u64) -> Result<Option<i64>> {
        let response = self
            .api(Method::POST, "caches")
            .json(&ReserveCacheRequest {
                key: key.as_str(),
                version,
                cache_size: size,
            })
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ActionError::Cache(format!(
                "failed to reserve cache {}: status {}",
                key,
                response.status()
            )));
        }
        let reserved: ReserveCacheResponse = response.json().await?;
        Ok(Some(reserved.cache_id))
    }

    async fn upload(&self, cache_id: i64, data: &[u8]) -> Result<()> {
        let resource = format!("caches/{cache_id}");
        for (index, chunk) in data.chunks(UPLOAD_CHUNK_SIZE).enumerate() {
            let start = index * UPLOAD_CHUNK_SIZE;
            let end = start + chunk.len() - 1;
            debug!(cache_id, start, end, "uploading chunk");
            self.api(Method::PATCH, &resource)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_RANGE, format!("bytes {start}-{end}/*"))
                .body(chunk.to_vec())
                .send()
                .await?
                .error_for_status()?;
        }

        self.api(Method::POST, &resource)
            .json(&CommitCacheRequest {
                size: data.len() as u64,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn tar_create(&self, archive: &Path, paths: &[PathBuf]) -> CommandSpec {
        let mut args = vec![
            "-czf".to_string(),
            archive.display().to_string(),
            "-P".to_string(),
        ];
        args.extend(paths.iter().map(|p| p.display().to_string()));
        CommandSpec::new(&self.tar, args).capture()
    }

    fn tar_extract(&self, archive: &Path) -> CommandSpec {
        CommandSpec::new(
            &self.tar,
            [
                "-xzf".to_string(),
                archive.display().to_string(),
                "-P".to_string(),
                "-C".to_string(),
                "/".to_string(),
            ],
        )
        .capture()
    }
}

#[async_trait]
impl CacheService for ActionsCacheClient {
    async fn restore(&self, paths: &[PathBuf], key: &CacheKey) -> Result<bool> {
        let version = cache_version(paths);
        let Some(location) = self.lookup(key, &version).await? else {
            info!("Cache not found for input keys: {}", key);
            return Ok(false);
        };

        let dir = tempfile::tempdir()?;
        let archive = dir.path().join(ARCHIVE_NAME);
        self.download(&location, &archive).await?;
        self.runner.run(&self.tar_extract(&archive)).await?;

        info!("Cache restored from key: {}", key);
        Ok(true)
    }

    async fn save(&self, paths: &[PathBuf], key: &CacheKey) -> Result<()> {
        let existing: Vec<PathBuf> = paths.iter().filter(|p| p.exists()).cloned().collect();
        if existing.is_empty() {
            return Err(ActionError::Cache(
                "none of the cache paths exist, nothing to save".to_string(),
            ));
        }

        let dir = tempfile::tempdir()?;
        let archive = dir.path().join(ARCHIVE_NAME);
        self.runner.run(&self.tar_create(&archive, &existing)).await?;
        let data = tokio::fs::read(&archive).await?;

        let version = cache_version(paths);
        if !self.store(key, &version, data).await? {
            info!("Cache entry {} is already being saved by another job", key);
            return Ok(());
        }

        info!("Cache saved with key: {}", key);
        Ok(())
    }
}

/// Stand-in used when no cache service is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

#[async_trait]
impl CacheService for DisabledCache {
    async fn restore(&self, _paths: &[PathBuf], key: &CacheKey) -> Result<bool> {
        info!("Cache service not configured; skipping restore of {}", key);
        Ok(false)
    }

    async fn save(&self, _paths: &[PathBuf], key: &CacheKey) -> Result<()> {
        info!("Cache service not configured; skipping save of {}", key);
        Ok(())
    }
}

/// Pick the cache service available in this environment.
pub fn cache_service_from_env(
    runner: Arc<dyn CommandRunner>,
    tar: &str,
) -> Result<Box<dyn CacheService>> {
    match ActionsCacheConfig::from_env() {
        Some(config) => Ok(Box::new(ActionsCacheClient::new(config, runner, tar)?)),
        None => Ok(Box::new(DisabledCache)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedRunner;

    #[test]
    fn test_config_normalizes_trailing_slash() {
        let config = ActionsCacheConfig::new("https://cache.example.com/abc", "t");
        assert_eq!(config.base_url, "https://cache.example.com/abc/");
        assert_eq!(
            config.endpoint("cache"),
            "https://cache.example.com/abc/_apis/artifactcache/cache"
        );
    }

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_results_service_endpoint() {
        let config = ActionsCacheConfig::results("https://results.example.com", "t");
        assert_eq!(config.protocol, CacheProtocol::Results);
        assert_eq!(
            config.rpc_endpoint("CreateCacheEntry"),
            "https://results.example.com/twirp/github.actions.results.api.v1.CacheService/CreateCacheEntry"
        );
    }

    #[test]
    fn test_config_prefers_results_service_when_flagged() {
        let env = [
            ("ACTIONS_RUNTIME_TOKEN", "t"),
            ("ACTIONS_CACHE_URL", "https://legacy.example.com/"),
            ("ACTIONS_RESULTS_URL", "https://results.example.com/"),
            ("ACTIONS_CACHE_SERVICE_V2", "true"),
        ];
        let config = ActionsCacheConfig::from_vars(vars(&env)).unwrap();
        assert_eq!(config.protocol, CacheProtocol::Results);
        assert_eq!(config.base_url, "https://results.example.com/");
    }

    #[test]
    fn test_config_legacy_without_flag() {
        let env = [
            ("ACTIONS_RUNTIME_TOKEN", "t"),
            ("ACTIONS_CACHE_URL", "https://legacy.example.com/"),
            ("ACTIONS_RESULTS_URL", "https://results.example.com/"),
        ];
        let config = ActionsCacheConfig::from_vars(vars(&env)).unwrap();
        assert_eq!(config.protocol, CacheProtocol::Legacy);
    }

    #[test]
    fn test_config_results_url_only() {
        let env = [
            ("ACTIONS_RUNTIME_TOKEN", "t"),
            ("ACTIONS_RESULTS_URL", "https://results.example.com/"),
        ];
        let config = ActionsCacheConfig::from_vars(vars(&env)).unwrap();
        assert_eq!(config.protocol, CacheProtocol::Results);
    }

    #[test]
    fn test_config_requires_token_and_url() {
        assert!(ActionsCacheConfig::from_vars(vars(&[("ACTIONS_RUNTIME_TOKEN", "t")])).is_none());
        assert!(ActionsCacheConfig::from_vars(vars(&[(
            "ACTIONS_RESULTS_URL",
            "https://results.example.com/"
        )]))
        .is_none());
    }

    #[test]
    fn test_finalize_request_sends_size_as_string() {
        let body = serde_json::to_value(FinalizeEntryRequest {
            key: "k",
            size_bytes: 42.to_string(),
            version: "v",
        })
        .unwrap();
        assert_eq!(body["size_bytes"], "42");
    }

    #[test]
    fn test_cache_version_depends_on_paths() {
        let a = cache_version(&[PathBuf::from("/home/runner/.cache/pre-commit")]);
        let b = cache_version(&[PathBuf::from("/home/runner/.cache/pre-commit")]);
        let c = cache_version(&[PathBuf::from("/root/.cache/pre-commit")]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_cache_version_matches_toolkit_layout() {
        let expected = sha256_hex(b"/tmp/cache|gzip|1.0");
        assert_eq!(cache_version(&[PathBuf::from("/tmp/cache")]), expected);
    }

    #[test]
    fn test_tar_commands() {
        let client = ActionsCacheClient::new(
            ActionsCacheConfig::new("https://cache.example.com/", "t"),
            Arc::new(ScriptedRunner::new()),
            "tar",
        )
        .unwrap();
        let create = client.tar_create(
            Path::new("/tmp/x/cache.tgz"),
            &[PathBuf::from("/home/runner/.cache/pre-commit")],
        );
        assert_eq!(
            create.to_string(),
            "tar -czf /tmp/x/cache.tgz -P /home/runner/.cache/pre-commit"
        );
        let extract = client.tar_extract(Path::new("/tmp/x/cache.tgz"));
        assert_eq!(extract.to_string(), "tar -xzf /tmp/x/cache.tgz -P -C /");
    }

    #[tokio::test]
    async fn test_save_without_existing_paths_is_error() {
        let client = ActionsCacheClient::new(
            ActionsCacheConfig::new("http://127.0.0.1:9/", "t"),
            Arc::new(ScriptedRunner::new()),
            "tar",
        )
        .unwrap();
        let key = CacheKey::derive("py", b"cfg");
        let err = client
            .save(&[PathBuf::from("/definitely/not/here")], &key)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Cache(_)));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_misses() {
        let key = CacheKey::derive("py", b"cfg");
        let paths = vec![PathBuf::from("/tmp/cache")];
        assert!(!DisabledCache.restore(&paths, &key).await.unwrap());
        assert!(DisabledCache.save(&paths, &key).await.is_ok());
    }
}
