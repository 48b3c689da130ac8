//! Configuration Management
//!
//! Persistent settings for aztfgen. Each value is resolved as
//! CLI flag > environment > config file > built-in default.

use crate::actions::{DEFAULT_ACTION_TIMEOUT, DEFAULT_RECURSIVE_TIMEOUT};
use crate::arm::client::DEFAULT_ENDPOINT;
use crate::crawl::RECURSIVE_DEPTH;
use crate::provider::install::{default_cache_dir, DEFAULT_RELEASES_URL};
use crate::provider::{
    ProviderConfig, DEFAULT_PROVIDER_CONFIG, DEFAULT_PROVIDER_NAME, DEFAULT_PROVIDER_VERSION,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENDPOINT_ENV_VAR: &str = "AZTFGEN_ARM_ENDPOINT";
pub const PROVIDER_VERSION_ENV_VAR: &str = "AZTFGEN_PROVIDER_VERSION";
pub const CACHE_DIR_ENV_VAR: &str = "AZTFGEN_CACHE_DIR";
pub const RELEASES_URL_ENV_VAR: &str = "AZTFGEN_RELEASES_URL";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// ARM endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub provider_version: Option<String>,
    /// Provider block body passed to the provider on configure
    #[serde(default)]
    pub provider_config: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Mirror of releases.hashicorp.com
    #[serde(default)]
    pub releases_url: Option<String>,
    #[serde(default)]
    pub action_timeout_secs: Option<u64>,
    #[serde(default)]
    pub recursive_timeout_secs: Option<u64>,
    #[serde(default)]
    pub recursive_depth: Option<usize>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aztfgen").join("config.json"))
    }

    /// Load configuration from disk; a missing or unreadable file gives defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring invalid config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get effective ARM endpoint (env > config > default)
    pub fn effective_endpoint(&self) -> String {
        env_var(ENDPOINT_ENV_VAR)
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Get effective provider version (env > config > pinned default)
    pub fn effective_provider_version(&self) -> String {
        env_var(PROVIDER_VERSION_ENV_VAR)
            .or_else(|| self.provider_version.clone())
            .unwrap_or_else(|| DEFAULT_PROVIDER_VERSION.to_string())
    }

    pub fn effective_cache_dir(&self) -> PathBuf {
        env_var(CACHE_DIR_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| self.cache_dir.clone())
            .unwrap_or_else(default_cache_dir)
    }

    pub fn effective_releases_url(&self) -> String {
        env_var(RELEASES_URL_ENV_VAR)
            .or_else(|| self.releases_url.clone())
            .unwrap_or_else(|| DEFAULT_RELEASES_URL.to_string())
    }

    pub fn effective_action_timeout(&self) -> Duration {
        self.action_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ACTION_TIMEOUT)
    }

    pub fn effective_recursive_timeout(&self) -> Duration {
        self.recursive_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RECURSIVE_TIMEOUT)
    }

    pub fn effective_recursive_depth(&self) -> usize {
        self.recursive_depth.unwrap_or(RECURSIVE_DEPTH)
    }

    /// Provider settings with CLI overrides applied on top
    pub fn provider_config(&self, version: Option<&str>, cache_dir: Option<&Path>) -> ProviderConfig {
        ProviderConfig {
            name: self
                .provider_name
                .clone()
                .unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string()),
            version: version
                .map(str::to_string)
                .unwrap_or_else(|| self.effective_provider_version()),
            config_hcl: self
                .provider_config
                .clone()
                .unwrap_or_else(|| DEFAULT_PROVIDER_CONFIG.to_string()),
            cache_dir: cache_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.effective_cache_dir()),
            releases_url: self.effective_releases_url(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
