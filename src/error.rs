//! Error types for the generation relay.
//!
//! Provider failures are classified into a closed [`FailureKind`] taxonomy before they leave an
//! adapter. Everything a caller of the job API can see is an [`ApiError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed set of provider failure kinds shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    InvalidSchema,
    UpstreamServerError,
    Unknown,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "TIMEOUT",
            FailureKind::RateLimited => "RATE_LIMITED",
            FailureKind::InvalidSchema => "INVALID_SCHEMA",
            FailureKind::UpstreamServerError => "UPSTREAM_SERVER_ERROR",
            FailureKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a failure originated. Only matters for `InvalidSchema`, where a malformed upstream
/// response is worth retrying but malformed input or adapter configuration is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    Upstream,
    Request,
    Configuration,
}

/// A classified provider failure. This is the only error type that crosses an adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,
    pub origin: FailureOrigin,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            origin: FailureOrigin::Upstream,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FailureKind::RateLimited, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(FailureKind::UpstreamServerError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// Upstream returned a 2xx body that failed structural validation.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidSchema, message)
    }

    /// Adapter is disabled or missing a credential, model, or endpoint.
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self {
            origin: FailureOrigin::Configuration,
            ..Self::new(FailureKind::InvalidSchema, message)
        }
    }

    /// An adapter was handed a request it cannot encode for its backend. Adapters are public and
    /// may be driven without the job front end, so they check this before any network I/O.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            origin: FailureOrigin::Request,
            ..Self::new(FailureKind::InvalidSchema, message)
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::RateLimited | FailureKind::UpstreamServerError => {
                true
            }
            FailureKind::InvalidSchema => self.origin == FailureOrigin::Upstream,
            FailureKind::Unknown => false,
        }
    }
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Failed to encode job record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job record missing during update: {0}")]
    MissingRecord(String),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Caller-facing errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timed out waiting: {0}")]
    WaitTimeout(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Generation failed: {0}")]
    Provider(#[from] ProviderFailure),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
