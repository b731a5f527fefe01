//! Adapter for a generic external research endpoint that speaks the payload JSON directly.

use crate::error::{ApiError, ProviderFailure};
use crate::provider::{
    build_provider_http_client, ensure_encodable, read_success_body, until_cancelled, CallContext,
    ExternalConfig, ProviderAdapter, ProviderPayload, TransportFailure, TransportOutcome,
};
use crate::types::{GenerationRequest, GenerationResult, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExternalRequest<'a> {
    keyword: &'a str,
    language: &'a str,
    country: &'a str,
    time_range: &'a str,
    max_items: u32,
    summary_level: &'a str,
    factcheck_mode: &'a str,
    trace_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

pub struct ExternalAdapter {
    client: Client,
    config: ExternalConfig,
}

impl ExternalAdapter {
    pub fn new(config: ExternalConfig) -> Result<Self, ApiError> {
        let client = build_provider_http_client(config.timeout())?;
        Ok(Self { client, config })
    }

    fn fail(&self, failure: TransportFailure, trace_id: &str) -> ProviderFailure {
        warn!(
            trace_id,
            outcome = ?failure.outcome,
            detail = %failure.detail,
            "external_transport_error"
        );
        failure.into_failure(self.name())
    }
}

#[async_trait]
impl ProviderAdapter for ExternalAdapter {
    async fn generate(
        &self,
        request: &GenerationRequest,
        ctx: &CallContext,
    ) -> Result<GenerationResult, ProviderFailure> {
        self.config.ensure_callable()?;
        ensure_encodable(request)?;
        info!(
            trace_id = %ctx.trace_id,
            keyword = %request.keyword,
            endpoint = %self.config.endpoint,
            "external_request"
        );

        let body = ExternalRequest {
            keyword: &request.keyword,
            language: &request.language,
            country: &request.country,
            time_range: &request.time_range,
            max_items: request.max_items,
            summary_level: &request.summary_level,
            factcheck_mode: &request.factcheck_mode,
            trace_id: &ctx.trace_id,
            model: self.config.model.as_deref(),
        };

        let start = Instant::now();
        let mut builder = self.client.post(&self.config.endpoint).json(&body);
        if let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.bearer_auth(api_key);
        }
        let response = until_cancelled(ctx, builder.send())
            .await
            .map_err(|f| self.fail(f, &ctx.trace_id))?;
        let text = read_success_body(ctx, response)
            .await
            .map_err(|f| self.fail(f, &ctx.trace_id))?;

        let payload: ProviderPayload = serde_json::from_str(&text).map_err(|e| {
            self.fail(
                TransportFailure::new(TransportOutcome::SchemaViolation, e.to_string()),
                &ctx.trace_id,
            )
        })?;
        let cache_hit = payload.cache_hit.unwrap_or(false);
        let (items, summary) = payload.into_validated("External research", request.max_items)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            trace_id = %ctx.trace_id,
            items = items.len(),
            latency_ms,
            cache_hit,
            "external_success"
        );

        Ok(GenerationResult {
            items,
            summary,
            usage: Usage {
                provider_calls: 1,
                latency_ms,
                cache_hit,
            },
            provider: self.name().to_string(),
            degraded: false,
        })
    }

    fn name(&self) -> &str {
        "external"
    }
}
