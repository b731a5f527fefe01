//! Provider configuration profiles.

use crate::error::ProviderFailure;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_openai_timeout_secs() -> u64 {
    20
}

fn default_temperature() -> f32 {
    0.2
}

fn default_external_timeout_secs() -> u64 {
    6
}

fn default_true() -> bool {
    true
}

/// OpenAI chat-completions adapter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key: String::new(),
            timeout_secs: default_openai_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl OpenAiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject the call before any network I/O when the adapter cannot be used.
    pub fn ensure_callable(&self) -> Result<(), ProviderFailure> {
        if !self.enabled {
            return Err(ProviderFailure::misconfigured(
                "OpenAI adapter is disabled",
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ProviderFailure::misconfigured(
                "OpenAI API key is required when the adapter is enabled",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ProviderFailure::misconfigured(
                "OpenAI model is required when the adapter is enabled",
            ));
        }
        Ok(())
    }

    /// Config-time validation; a disabled adapter is always valid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        self.ensure_callable().map_err(|f| f.message)?;
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("base_url must be an http(s) URL: {}", self.base_url));
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than zero".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0.0 and 2.0 (got {})",
                self.temperature
            ));
        }
        Ok(())
    }
}

/// Generic external JSON endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_external_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: String::new(),
            api_key: None,
            model: None,
            timeout_secs: default_external_timeout_secs(),
        }
    }
}

impl ExternalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ensure_callable(&self) -> Result<(), ProviderFailure> {
        if !self.enabled {
            return Err(ProviderFailure::misconfigured(
                "External adapter is disabled",
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ProviderFailure::misconfigured(
                "External endpoint is required when the adapter is enabled",
            ));
        }
        Ok(())
    }

    /// True when the adapter should be placed in the chain.
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.endpoint.trim().is_empty()
    }

    /// An enabled adapter without an endpoint is simply left out of the chain.
    pub fn validate(&self) -> Result<(), String> {
        if !self.is_configured() {
            return Ok(());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(format!("endpoint must be an http(s) URL: {}", self.endpoint));
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}
