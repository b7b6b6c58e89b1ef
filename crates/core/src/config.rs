//! Configuration loading and validation.
//!
//! Configuration is a TOML file. Secrets never live in the file itself: the
//! `token_env` field names an environment variable holding the access token.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::errors::ConfigError;
use crate::store::GitHubStore;
use crate::vcs::{RepoCoordinates, RetryPolicy};

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "DECKVAULT_TOKEN".to_string()
}

fn default_deck_path() -> String {
    "deck.json".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_offload_threshold() -> usize {
    crate::diff::OFFLOAD_THRESHOLD
}

fn default_offload_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    crate::cache::DEFAULT_CAPACITY
}

/// Store connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_deck_path")]
    pub deck_path: String,
    /// Name of the environment variable holding the access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiffConfig {
    #[serde(default = "default_offload_threshold")]
    pub offload_threshold: usize,
    #[serde(default = "default_offload_timeout_secs")]
    pub offload_timeout_secs: u64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            offload_threshold: default_offload_threshold(),
            offload_timeout_secs: default_offload_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.owner.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.owner".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.store.repo.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.repo".into(),
                detail: "must not be empty".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".into(),
                detail: "must be at least 1".into(),
            });
        }
        if self.diff.offload_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "diff.offload_threshold".into(),
                detail: "must be at least 1".into(),
            });
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity".into(),
                detail: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Resolve the access token from the configured environment variable.
    pub fn resolve_token(&self) -> Result<String, ConfigError> {
        std::env::var(&self.store.token_env).map_err(|_| ConfigError::EnvVarMissing {
            var: self.store.token_env.clone(),
            field: "store.token_env".into(),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }

    pub fn repo_coordinates(&self) -> RepoCoordinates {
        RepoCoordinates::new(&self.store.owner, &self.store.repo, &self.store.deck_path)
    }

    /// Build the production store from this configuration.
    pub fn build_store(&self) -> Result<GitHubStore, ConfigError> {
        let token = self.resolve_token()?;
        Ok(GitHubStore::new(
            &self.store.api_url,
            &self.store.owner,
            &self.store.repo,
            token,
        ))
    }
}
