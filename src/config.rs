//! Credential and instance resolution
//!
//! Credentials come from `LIGHTHOUSE_SECRET=secretId:secretKey[:instanceId]`
//! or, when that is unset, from the cached `lighthouse.json` in the data
//! directory. Whenever the environment supplied the values (or defaults had to
//! be filled in) the cache is rewritten so later runs work without the
//! variable.

use crate::core::error::{Error, Result};
use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SECRET_ENV: &str = "LIGHTHOUSE_SECRET";
pub const CONFIG_FILE_NAME: &str = "lighthouse.json";
pub const DEFAULT_REGION: &str = "ap-beijing";
pub const DEFAULT_ENDPOINT: &str = "lighthouse.tencentcloudapi.com";

/// On-disk cache. Every field may be missing or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedConfig {
    #[serde(default, rename = "secretID", alias = "secretId")]
    pub secret_id: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub instance_id: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub endpoint: String,
}

/// Credential parsed from the environment value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub secret_id: String,
    pub secret_key: String,
    pub instance_id: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

/// Everything needed to construct a Lighthouse client.
#[derive(Clone, PartialEq, Eq)]
pub struct LighthouseConfig {
    pub secret_id: String,
    pub secret_key: String,
    /// Default instance, used when no `--instance-id` is given
    pub instance_id: Option<String>,
    pub region: String,
    pub endpoint: String,
}

impl fmt::Debug for LighthouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LighthouseConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("instance_id", &self.instance_id)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl LighthouseConfig {
    fn to_cached(&self) -> CachedConfig {
        CachedConfig {
            secret_id: self.secret_id.clone(),
            secret_key: self.secret_key.clone(),
            instance_id: self.instance_id.clone().unwrap_or_default(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parses `secretId:secretKey[:instanceId]`.
pub fn parse_secret(value: &str) -> Result<Credential> {
    let mut parts = value.trim().splitn(3, ':');
    let secret_id = parts.next().and_then(non_empty);
    let secret_key = parts.next().and_then(non_empty);
    let instance_id = parts.next().and_then(non_empty);

    match (secret_id, secret_key) {
        (Some(secret_id), Some(secret_key)) => Ok(Credential {
            secret_id,
            secret_key,
            instance_id,
        }),
        _ => Err(Error::Config(format!(
            "bad ${SECRET_ENV}, expected secretId:secretKey[:instanceId]"
        ))),
    }
}

/// Combines the environment value and the cached file.
///
/// Returns the config and whether the cache should be rewritten.
pub fn resolve(
    env_secret: Option<&str>,
    cached: Option<CachedConfig>,
) -> Result<(LighthouseConfig, bool)> {
    let cached = cached.unwrap_or_default();
    let env_secret = env_secret.filter(|v| !v.trim().is_empty());

    let (credential, mut rewrite) = if let Some(value) = env_secret {
        let mut credential = parse_secret(value)?;
        if credential.instance_id.is_none() {
            credential.instance_id = non_empty(&cached.instance_id);
        }
        (credential, true)
    } else {
        match (non_empty(&cached.secret_id), non_empty(&cached.secret_key)) {
            (Some(secret_id), Some(secret_key)) => (
                Credential {
                    secret_id,
                    secret_key,
                    instance_id: non_empty(&cached.instance_id),
                },
                false,
            ),
            _ => {
                return Err(Error::Config(format!(
                    "no credentials configured, e.g. export {SECRET_ENV}=secretId:secretKey[:instanceId]"
                )));
            }
        }
    };

    let region = non_empty(&cached.region).unwrap_or_else(|| {
        rewrite = true;
        DEFAULT_REGION.to_string()
    });
    let endpoint = non_empty(&cached.endpoint).unwrap_or_else(|| {
        rewrite = true;
        DEFAULT_ENDPOINT.to_string()
    });

    Ok((
        LighthouseConfig {
            secret_id: credential.secret_id,
            secret_key: credential.secret_key,
            instance_id: credential.instance_id,
            region,
            endpoint,
        },
        rewrite,
    ))
}

/// Picks the target instance: explicit flag first, then the configured default.
pub fn resolve_instance_id(flag: Option<&str>, config: &LighthouseConfig) -> Result<String> {
    flag.and_then(non_empty)
        .or_else(|| config.instance_id.clone())
        .ok_or_else(|| {
            Error::Config(format!(
                "no instance id: pass --instance-id or set {SECRET_ENV}=secretId:secretKey:instanceId"
            ))
        })
}

pub fn config_path() -> Option<PathBuf> {
    get_data_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Reads the cached config. Missing or unreadable files yield `None`.
pub async fn load_cached(path: &Path) -> Option<CachedConfig> {
    let json = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str(&json) {
        Ok(cached) => Some(cached),
        Err(e) => {
            warn!("Ignoring malformed {}: {e}", path.display());
            None
        }
    }
}

/// Saves the cached config using an atomic write pattern.
/// 1. Writes to a temporary file in the same directory.
/// 2. Sets restrictive permissions (0o600) before any data is written.
/// 3. Atomically renames to the target path.
pub async fn save_cached(path: &Path, config: &CachedConfig) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    let temp_path = path.with_extension("json.tmp");

    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(temp_path, path).await
}

/// Resolves the config from the process environment and the cache file,
/// rewriting the cache when needed. A failed rewrite is only logged.
pub async fn load() -> Result<LighthouseConfig> {
    let env_secret = std::env::var(SECRET_ENV).ok();
    let path = config_path();

    let cached = match &path {
        Some(path) => load_cached(path).await,
        None => None,
    };

    let (config, rewrite) = resolve(env_secret.as_deref(), cached)?;
    debug!(region = %config.region, endpoint = %config.endpoint, "Resolved Lighthouse config");

    if rewrite && let Some(path) = path {
        if let Err(e) = crate::utils::ensure_dirs() {
            warn!("Cannot create data directory: {e}");
        } else if let Err(e) = save_cached(&path, &config.to_cached()).await {
            warn!("Write {} error: {e}", path.display());
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(id: &str, key: &str, instance: &str) -> CachedConfig {
        CachedConfig {
            secret_id: id.into(),
            secret_key: key.into(),
            instance_id: instance.into(),
            region: "ap-guangzhou".into(),
            endpoint: "lighthouse.example.com".into(),
        }
    }

    #[test]
    fn test_parse_secret_with_instance() {
        let cred = parse_secret("AKID:KEY:lhins-1").unwrap();
        assert_eq!(cred.secret_id, "AKID");
        assert_eq!(cred.secret_key, "KEY");
        assert_eq!(cred.instance_id.as_deref(), Some("lhins-1"));
    }

    #[test]
    fn test_parse_secret_without_instance() {
        let cred = parse_secret("AKID:KEY").unwrap();
        assert_eq!(cred.instance_id, None);
    }

    #[test]
    fn test_parse_secret_rejects_malformed() {
        assert!(matches!(parse_secret("AKID"), Err(Error::Config(_))));
        assert!(matches!(parse_secret("AKID:"), Err(Error::Config(_))));
        assert!(matches!(parse_secret(":KEY"), Err(Error::Config(_))));
    }

    #[test]
    fn test_credential_debug_redacts_key() {
        let cred = parse_secret("AKID:SUPERSECRET").unwrap();
        assert!(!format!("{cred:?}").contains("SUPERSECRET"));
    }

    #[test]
    fn test_missing_everything_is_config_error() {
        let err = resolve(None, None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(SECRET_ENV));
    }

    #[test]
    fn test_empty_env_and_empty_cache_is_config_error() {
        assert!(matches!(
            resolve(Some("  "), Some(CachedConfig::default())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_wins_over_cache() {
        let (config, rewrite) =
            resolve(Some("ENVID:ENVKEY:lhins-env"), Some(cached("C", "K", "lhins-cache"))).unwrap();
        assert_eq!(config.secret_id, "ENVID");
        assert_eq!(config.instance_id.as_deref(), Some("lhins-env"));
        assert_eq!(config.region, "ap-guangzhou");
        assert!(rewrite);
    }

    #[test]
    fn test_env_without_instance_falls_back_to_cached_instance() {
        let (config, _) =
            resolve(Some("ENVID:ENVKEY"), Some(cached("C", "K", "lhins-cache"))).unwrap();
        assert_eq!(config.instance_id.as_deref(), Some("lhins-cache"));
    }

    #[test]
    fn test_cache_only_does_not_rewrite() {
        let (config, rewrite) = resolve(None, Some(cached("C", "K", ""))).unwrap();
        assert_eq!(config.secret_id, "C");
        assert_eq!(config.instance_id, None);
        assert!(!rewrite);
    }

    #[test]
    fn test_defaults_filled_and_rewritten() {
        let mut partial = cached("C", "K", "lhins-1");
        partial.region.clear();
        partial.endpoint.clear();
        let (config, rewrite) = resolve(None, Some(partial)).unwrap();
        assert_eq!(config.region, DEFAULT_REGION);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(rewrite);
    }

    #[test]
    fn test_instance_id_resolution_order() {
        let (config, _) = resolve(Some("A:B:lhins-env"), None).unwrap();
        assert_eq!(resolve_instance_id(Some("lhins-flag"), &config).unwrap(), "lhins-flag");
        assert_eq!(resolve_instance_id(None, &config).unwrap(), "lhins-env");
        assert_eq!(resolve_instance_id(Some(""), &config).unwrap(), "lhins-env");

        let (config, _) = resolve(Some("A:B"), None).unwrap();
        assert!(matches!(resolve_instance_id(None, &config), Err(Error::Config(_))));
    }

    #[test]
    fn test_cached_config_reads_original_key_names() {
        let json = r#"{"secretID":"X","secretKey":"Y","instanceId":"lhins-9","region":"","endpoint":""}"#;
        let cached: CachedConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cached.secret_id, "X");
        assert_eq!(cached.instance_id, "lhins-9");
    }

    #[tokio::test]
    async fn test_save_and_load_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = cached("C", "K", "lhins-1");

        save_cached(&path, &config).await.unwrap();
        assert_eq!(load_cached(&path).await, Some(config));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_load_cached_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "not json").await.unwrap();
        assert_eq!(load_cached(&path).await, None);
        assert_eq!(load_cached(&dir.path().join("missing.json")).await, None);
    }
}
