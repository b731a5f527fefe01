//! Configuration System
//!
//! Layered configuration built with the `config` crate: built-in defaults, then an optional TOML
//! file, then `GENRELAY__*` environment variables. The conventional `OPENAI_API_KEY` variable fills
//! the OpenAI key when nothing else set it.

use crate::error::ApiError;
use crate::jobs::OrchestratorConfig;
use crate::logging::LoggingConfig;
use crate::provider::{ExternalConfig, OpenAiConfig};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File picked up from the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "genrelay.toml";

const ENV_PREFIX: &str = "GENRELAY";
const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenrelayConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Primary adapters, in chain order: OpenAI first, then the external endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub external: ExternalConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Answer with the deterministic stub when every primary fails
    #[serde(default = "default_true")]
    pub allow_stub_fallback: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            allow_stub_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Advertised on cache hits; entries are not expired
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,

    #[serde(default = "default_rate_limit_retry_after_secs")]
    pub rate_limit_retry_after_secs: u64,

    #[serde(default = "default_max_items_limit")]
    pub max_items_limit: u32,

    #[serde(default)]
    pub store: StoreBackend,

    /// Sled directory; defaults to the platform data directory
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    2
}

fn default_cache_ttl_secs() -> u64 {
    180
}

fn default_retry_after_secs() -> u64 {
    5
}

fn default_rate_limit_retry_after_secs() -> u64 {
    30
}

fn default_max_items_limit() -> u32 {
    20
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            cache_ttl_secs: default_cache_ttl_secs(),
            retry_after_secs: default_retry_after_secs(),
            rate_limit_retry_after_secs: default_rate_limit_retry_after_secs(),
            max_items_limit: default_max_items_limit(),
            store: StoreBackend::Memory,
            store_path: None,
        }
    }
}

impl JobsConfig {
    /// Directory for the sled store
    pub fn resolve_store_path(&self) -> PathBuf {
        if let Some(path) = &self.store_path {
            return path.clone();
        }
        ProjectDirs::from("", "", "genrelay")
            .map(|dirs| dirs.data_dir().join("jobs"))
            .unwrap_or_else(|| PathBuf::from(".genrelay").join("jobs"))
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            workers: self.workers,
            cache_ttl_secs: self.cache_ttl_secs,
            retry_after_secs: self.retry_after_secs,
            rate_limit_retry_after_secs: self.rate_limit_retry_after_secs,
            max_items_limit: self.max_items_limit,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }
        if self.max_items_limit == 0 {
            return Err("max_items_limit must be at least 1".to_string());
        }
        if matches!(&self.store_path, Some(p) if p.as_os_str().is_empty()) {
            return Err("store_path cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String, String),
    Jobs(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(name, msg) => write!(f, "Provider '{}': {}", name, msg),
            ValidationError::Jobs(msg) => write!(f, "Jobs: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl GenrelayConfig {
    /// Validate the entire configuration, collecting every problem
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.providers.openai.validate() {
            errors.push(ValidationError::Provider("openai".to_string(), e));
        }
        if let Err(e) = self.providers.external.validate() {
            errors.push(ValidationError::Provider("external".to_string(), e));
        }
        if let Err(e) = self.jobs.validate() {
            errors.push(ValidationError::Jobs(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every error into one `ConfigError`
    pub fn ensure_valid(&self) -> Result<(), ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })
    }
}

/// Loads [`GenrelayConfig`] from its layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load with the process environment. `path` overrides `./genrelay.toml`; an explicit path
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<GenrelayConfig, ApiError> {
        let env: config::Map<String, String> = std::env::vars().collect();
        Self::load_with_env(path, env)
    }

    /// Load from a file only, without environment overrides
    pub fn load_from_file(path: &Path) -> Result<GenrelayConfig, ApiError> {
        Self::load_with_env(Some(path), config::Map::new())
    }

    /// Load against an explicit environment map instead of the process environment.
    pub fn load_with_env(
        path: Option<&Path>,
        env: config::Map<String, String>,
    ) -> Result<GenrelayConfig, ApiError> {
        let mut builder = Self::builder_with_defaults()?;

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ApiError::ConfigError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                debug!(config_path = %path.display(), "Loading configuration file");
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                builder = builder.add_source(
                    File::new(DEFAULT_CONFIG_FILE, FileFormat::Toml).required(false),
                );
            }
        }

        let openai_key = env.get(OPENAI_KEY_ENV).cloned();
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(env)),
        );

        let mut config: GenrelayConfig = builder.build()?.try_deserialize()?;
        if config.providers.openai.api_key.trim().is_empty() {
            if let Some(key) = openai_key.filter(|k| !k.trim().is_empty()) {
                config.providers.openai.api_key = key;
            }
        }
        Ok(config)
    }

    fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("fallback.allow_stub_fallback", true)?
            .set_default("jobs.workers", default_workers() as i64)?
            .set_default("jobs.cache_ttl_secs", default_cache_ttl_secs() as i64)?
            .set_default("jobs.max_items_limit", default_max_items_limit() as i64)?
            .set_default("jobs.store", "memory")?
            .set_default("logging.level", "info")
    }
}
