//! Configuration for the pipeline, the transit gateway and the filesystem backend

use crate::compression::DEFAULT_ZSTD_LEVEL;
use crate::error::{QubitLockError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `vault.token`
pub const ENV_VAULT_TOKEN: &str = "QUBITLOCK_VAULT_TOKEN";
/// Environment variable overriding `vault.url`
pub const ENV_VAULT_URL: &str = "QUBITLOCK_VAULT_URL";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QubitLockConfig {
    /// Transit encryption service
    pub vault: VaultConfig,
    /// Filesystem storage backend
    pub storage: StorageConfig,
    /// Global feature toggles
    pub features: FeatureFlags,
    /// Compression tuning
    pub compression: CompressionConfig,
}

/// Connection settings for the transit encryption service
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Base URL, e.g. `http://127.0.0.1:8200`
    pub url: String,
    /// Service token sent as `X-Vault-Token`
    pub token: String,
    /// Mount path of the transit engine
    pub mount: String,
    /// Name of the transit key
    pub key_name: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://127.0.0.1:8200"),
            token: String::new(),
            mount: String::from("transit"),
            key_name: String::from("qubitlock"),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("mount", &self.mount)
            .field("key_name", &self.key_name)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Filesystem backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for blobs, metadata records and the insertion index
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./qubitlock-data"),
        }
    }
}

/// Global feature toggles; combined with per-call options by logical AND
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Allow compression before encryption
    pub compression: bool,
    /// Allow integrity roots over stored ciphertext
    pub integrity: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            compression: true,
            integrity: true,
        }
    }
}

/// Compression tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Zstd level for text-like payloads, clamped to 1..=19
    pub zstd_level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            zstd_level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

impl QubitLockConfig {
    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents).map_err(|e| QubitLockError::Config(e.to_string())),
            "json" => Ok(serde_json::from_str(&contents)?),
            _ => Err(QubitLockError::Config(format!(
                "Unsupported config file extension: {}",
                ext
            ))),
        }
    }

    /// Override vault settings from `QUBITLOCK_VAULT_TOKEN` and `QUBITLOCK_VAULT_URL`.
    pub fn apply_env(mut self) -> Self {
        self.apply_overrides(
            std::env::var(ENV_VAULT_TOKEN).ok(),
            std::env::var(ENV_VAULT_URL).ok(),
        );
        self
    }

    fn apply_overrides(&mut self, token: Option<String>, url: Option<String>) {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.vault.token = token;
        }
        if let Some(url) = url.filter(|u| !u.is_empty()) {
            self.vault.url = url;
        }
    }
}
