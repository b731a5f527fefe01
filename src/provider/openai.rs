//! OpenAI chat-completions adapter.

use crate::error::{ApiError, ProviderFailure};
use crate::provider::{
    build_provider_http_client, ensure_encodable, read_success_body, until_cancelled, CallContext,
    OpenAiConfig, ProviderAdapter, ProviderPayload, TransportFailure, TransportOutcome,
};
use crate::types::{GenerationRequest, GenerationResult, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str =
    "You are a research extraction engine. Return JSON only with camelCase keys and no markdown.";

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Adapter for an OpenAI-compatible `/v1/chat/completions` endpoint
pub struct OpenAiAdapter {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiAdapter {
    pub fn new(config: OpenAiConfig) -> Result<Self, ApiError> {
        let client = build_provider_http_client(config.timeout())?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn fail(&self, failure: TransportFailure, trace_id: &str) -> ProviderFailure {
        warn!(
            trace_id,
            outcome = ?failure.outcome,
            detail = %failure.detail,
            "openai_transport_error"
        );
        failure.into_failure(self.name())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
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
            model = %self.config.model,
            max_items = request.max_items,
            "openai_request"
        );

        let body = ChatCompletionRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt(request, &ctx.trace_id),
                },
            ],
        };

        let start = Instant::now();
        let send = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();
        let response = until_cancelled(ctx, send)
            .await
            .map_err(|f| self.fail(f, &ctx.trace_id))?;
        let text = read_success_body(ctx, response)
            .await
            .map_err(|f| self.fail(f, &ctx.trace_id))?;

        let completion: ChatCompletionResponse = serde_json::from_str(&text).map_err(|e| {
            self.fail(
                TransportFailure::new(TransportOutcome::SchemaViolation, e.to_string()),
                &ctx.trace_id,
            )
        })?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();
        let content = content.trim();
        debug!(trace_id = %ctx.trace_id, content_len = content.len(), "openai_raw_response");

        if content.is_empty() {
            return Err(ProviderFailure::schema("OpenAI returned empty content"));
        }
        let payload: ProviderPayload =
            serde_json::from_str(strip_code_fence(content)).map_err(|_| {
                ProviderFailure::schema("OpenAI response is not a valid research JSON payload")
            })?;
        let (items, summary) = payload.into_validated("OpenAI", request.max_items)?;

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            trace_id = %ctx.trace_id,
            items = items.len(),
            latency_ms,
            "openai_success"
        );

        Ok(GenerationResult {
            items,
            summary,
            usage: Usage {
                provider_calls: 1,
                latency_ms,
                cache_hit: false,
            },
            provider: self.name().to_string(),
            degraded: false,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn user_prompt(request: &GenerationRequest, trace_id: &str) -> String {
    format!(
        "Build a research payload for the request below.\n\
         Request:\n\
         - keyword: {}\n\
         - language: {}\n\
         - country: {}\n\
         - timeRange: {}\n\
         - maxItems: {}\n\
         - summaryLevel: {}\n\
         - factcheckMode: {}\n\
         - traceId: {}\n\n\
         Return one JSON object with keys \"items\" and \"summary\".\n\
         Each item has itemId, title, snippet, source {{publisher, url, sourceType, author}}, \
         timestamps {{publishedAt, collectedAt, lastVerifiedAt}}, \
         factcheck {{status, confidence, confidenceReasons, claims [{{claimText, verdict, evidenceIds}}]}}, \
         trend {{trendScore, velocity, regionRank}}.\n\
         summary has brief, analystNote, riskFlags.\n\
         Rules: 1..{} items, include every key, no markdown fences.",
        request.keyword,
        request.language,
        request.country,
        request.time_range,
        request.max_items,
        request.summary_level,
        request.factcheck_mode,
        trace_id,
        request.max_items
    )
}

/// Models sometimes wrap JSON in a Markdown fence despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
