//! Provider Adapters
//!
//! One adapter per external generation backend. An adapter turns a [`GenerationRequest`] into its
//! backend's wire format, issues the call under a bounded timeout, and maps every failure into the
//! [`FailureKind`](crate::error::FailureKind) taxonomy before returning. No `reqwest::Error`
//! escapes this module tree.

use crate::error::{ApiError, ProviderFailure};
use crate::types::{ContentItem, GenerationRequest, GenerationResult, Summary};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub mod classify;
pub mod external;
pub mod openai;
pub mod profile;
pub mod stub;

pub use classify::{classify, TransportFailure, TransportOutcome};
pub use external::ExternalAdapter;
pub use openai::OpenAiAdapter;
pub use profile::{ExternalConfig, OpenAiConfig};
pub use stub::StubGenerator;

/// Per-call context handed to every adapter
#[derive(Debug, Clone)]
pub struct CallContext {
    pub trace_id: String,
    cancellation: CancellationToken,
}

impl CallContext {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self::with_cancellation(trace_id, CancellationToken::new())
    }

    pub fn with_cancellation(trace_id: impl Into<String>, cancellation: CancellationToken) -> Self {
        Self {
            trace_id: trace_id.into(),
            cancellation,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Generation provider trait
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Produce a result for the request, or a classified failure
    async fn generate(
        &self,
        request: &GenerationRequest,
        ctx: &CallContext,
    ) -> Result<GenerationResult, ProviderFailure>;

    /// Adapter name used in logs and result attribution
    fn name(&self) -> &str;
}

/// `{items, summary}` body shared by every JSON-speaking backend
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProviderPayload {
    #[serde(default)]
    pub items: Vec<ContentItem>,
    #[serde(default)]
    pub summary: Option<Summary>,
    #[serde(default)]
    pub cache_hit: Option<bool>,
}

impl ProviderPayload {
    /// Structural validation of a decoded 2xx body. Items past `max_items` are dropped.
    pub(crate) fn into_validated(
        self,
        provider: &str,
        max_items: u32,
    ) -> Result<(Vec<ContentItem>, Summary), ProviderFailure> {
        let mut items = self.items;
        if items.is_empty() {
            return Err(ProviderFailure::schema(format!(
                "{} response contains no items",
                provider
            )));
        }
        let summary = self.summary.ok_or_else(|| {
            ProviderFailure::schema(format!("{} response contains no summary", provider))
        })?;
        if items.iter().any(|item| item.title.trim().is_empty()) {
            return Err(ProviderFailure::schema(format!(
                "{} response contains an item without a title",
                provider
            )));
        }
        items.truncate(max_items as usize);
        Ok((items, summary))
    }
}

/// Reject a request no backend can answer, before any network I/O.
pub(crate) fn ensure_encodable(request: &GenerationRequest) -> Result<(), ProviderFailure> {
    if request.keyword.trim().is_empty() {
        return Err(ProviderFailure::invalid_input("keyword must not be blank"));
    }
    if request.max_items == 0 {
        return Err(ProviderFailure::invalid_input("max_items must be at least 1"));
    }
    Ok(())
}

/// Build the HTTP client for one adapter; connect and read share the adapter's timeout.
pub(crate) fn build_provider_http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Drive a transport future until it finishes or the call is cancelled.
pub(crate) async fn until_cancelled<T, F>(ctx: &CallContext, fut: F) -> Result<T, TransportFailure>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancellation().cancelled() => Err(TransportFailure::cancelled()),
        res = fut => res.map_err(|e| TransportFailure::from_reqwest(&e)),
    }
}

/// Read a response body as text, mapping non-2xx statuses to a transport failure.
pub(crate) async fn read_success_body(
    ctx: &CallContext,
    response: Response,
) -> Result<String, TransportFailure> {
    let status = response.status();
    if !status.is_success() {
        let body = until_cancelled(ctx, response.text())
            .await
            .unwrap_or_default();
        let excerpt: String = body.chars().take(300).collect();
        return Err(TransportFailure::new(
            TransportOutcome::Status(status.as_u16()),
            format!("{} {}", status, excerpt),
        ));
    }
    until_cancelled(ctx, response.text()).await
}
