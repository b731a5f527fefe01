//! Deterministic terminal stand-in used when every real provider is exhausted.

use crate::chain::StandIn;
use crate::error::ProviderFailure;
use crate::provider::{CallContext, ProviderAdapter};
use crate::types::{
    Claim, ContentItem, Factcheck, GenerationRequest, GenerationResult, ItemSource,
    ItemTimestamps, Summary, Trend, Usage,
};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

/// Never fails. Content depends only on the request, apart from collection timestamps.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubGenerator;

impl StubGenerator {
    pub fn new() -> Self {
        Self
    }

    fn item(request: &GenerationRequest, now: &str) -> ContentItem {
        let fingerprint = request.fingerprint();
        ContentItem {
            item_id: format!("stub-{}", &fingerprint.as_str()[..12]),
            title: format!("{}: recent developments", request.keyword),
            snippet: format!(
                "Recent changes around {} are still being verified against their sources.",
                request.keyword
            ),
            source: ItemSource {
                publisher: "trend-feed".to_string(),
                url: format!("https://example.com/search?keyword={}", request.keyword),
                source_type: "official".to_string(),
                author: None,
            },
            timestamps: ItemTimestamps {
                published_at: now.to_string(),
                collected_at: now.to_string(),
                last_verified_at: now.to_string(),
            },
            factcheck: Factcheck {
                status: "insufficient".to_string(),
                confidence: 0.58,
                confidence_reasons: vec!["initial_fetch".to_string(), "single_source".to_string()],
                claims: vec![Claim {
                    claim_text: format!("Coverage of {} is limited so far.", request.keyword),
                    verdict: "insufficient".to_string(),
                    evidence_ids: vec!["ev-1".to_string(), "ev-2".to_string()],
                }],
            },
            trend: Trend {
                trend_score: 76,
                velocity: 1.3,
                region_rank: 4,
            },
        }
    }
}

impl StandIn for StubGenerator {
    fn stand_in(&self, request: &GenerationRequest, _trace_id: &str) -> GenerationResult {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        GenerationResult {
            items: vec![Self::item(request, &now)],
            summary: Summary {
                brief: format!("Summary: {} is at the monitoring stage.", request.keyword),
                analyst_note: "Little evidence collected yet; further verification needed."
                    .to_string(),
                risk_flags: vec!["insufficient_evidence".to_string()],
            },
            usage: Usage {
                provider_calls: 1,
                latency_ms: 0,
                cache_hit: false,
            },
            provider: "stub".to_string(),
            degraded: true,
        }
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[async_trait]
impl ProviderAdapter for StubGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        ctx: &CallContext,
    ) -> Result<GenerationResult, ProviderFailure> {
        Ok(self.stand_in(request, &ctx.trace_id))
    }

    fn name(&self) -> &str {
        "stub"
    }
}
