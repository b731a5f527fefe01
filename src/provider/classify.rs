//! Transport outcome classification.
//!
//! Every adapter reduces whatever went wrong on the wire to a [`TransportOutcome`] and lets
//! [`classify`] pick the [`FailureKind`]. Keeping the outcome synthetic means the mapping is testable
//! without a network.

use crate::error::{FailureKind, ProviderFailure};

/// What happened to one provider call, independent of the HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOutcome {
    /// Upstream answered with a non-2xx status
    Status(u16),
    /// Connect or read deadline expired
    Timeout,
    /// The call was abandoned because its context was cancelled
    Cancelled,
    /// Connection could not be established
    Connect,
    /// 2xx body decoded but failed structural validation
    SchemaViolation,
    /// Response could not be read or decoded at the transport level
    MalformedBody,
    /// Anything else
    Other,
}

/// Map a transport outcome to the failure taxonomy. Rules apply in priority order.
pub fn classify(outcome: TransportOutcome) -> FailureKind {
    match outcome {
        TransportOutcome::Status(429) => FailureKind::RateLimited,
        TransportOutcome::Status(500..=599) => FailureKind::UpstreamServerError,
        TransportOutcome::Timeout | TransportOutcome::Cancelled | TransportOutcome::Connect => {
            FailureKind::Timeout
        }
        TransportOutcome::SchemaViolation => FailureKind::InvalidSchema,
        TransportOutcome::Status(_) | TransportOutcome::MalformedBody | TransportOutcome::Other => {
            FailureKind::Unknown
        }
    }
}

/// A transport outcome plus the detail worth logging
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub outcome: TransportOutcome,
    pub detail: String,
}

impl TransportFailure {
    pub fn new(outcome: TransportOutcome, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            detail: detail.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(TransportOutcome::Cancelled, "call cancelled")
    }

    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let outcome = if let Some(status) = error.status() {
            TransportOutcome::Status(status.as_u16())
        } else if error.is_timeout() {
            TransportOutcome::Timeout
        } else if error.is_connect() {
            TransportOutcome::Connect
        } else if error.is_decode() || error.is_body() {
            TransportOutcome::MalformedBody
        } else {
            TransportOutcome::Other
        };
        Self::new(outcome, error.to_string())
    }

    /// Classify and attribute to a provider.
    pub fn into_failure(self, provider: &str) -> ProviderFailure {
        ProviderFailure::new(
            classify(self.outcome),
            format!("{} call failed: {}", provider, self.detail),
        )
    }
}
