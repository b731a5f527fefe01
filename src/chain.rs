//! Fallback Chain
//!
//! Composes an ordered list of primary adapters and an optional terminal stand-in into a single
//! [`ProviderAdapter`]. Primaries are tried in order, each at most once per call; the first success
//! wins. When every primary fails, the stand-in answers only if fallback is enabled. Otherwise the
//! *first* recorded failure is returned so callers see a stable root cause.

use crate::error::ProviderFailure;
use crate::provider::{CallContext, ProviderAdapter};
use crate::types::{GenerationRequest, GenerationResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Non-failing generator used after every primary adapter has failed
pub trait StandIn: Send + Sync {
    fn stand_in(&self, request: &GenerationRequest, trace_id: &str) -> GenerationResult;

    fn name(&self) -> &str;
}

/// Ordered provider chain with optional degraded fallback
pub struct FallbackChain {
    primaries: Vec<Arc<dyn ProviderAdapter>>,
    stand_in: Option<Arc<dyn StandIn>>,
    allow_stand_in: bool,
}

impl FallbackChain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::default()
    }

    /// Names of the primary adapters in try order
    pub fn primary_names(&self) -> Vec<&str> {
        self.primaries.iter().map(|p| p.name()).collect()
    }

    pub fn stand_in_enabled(&self) -> bool {
        self.allow_stand_in && self.stand_in.is_some()
    }
}

#[async_trait]
impl ProviderAdapter for FallbackChain {
    async fn generate(
        &self,
        request: &GenerationRequest,
        ctx: &CallContext,
    ) -> Result<GenerationResult, ProviderFailure> {
        let mut first_failure: Option<ProviderFailure> = None;

        for adapter in &self.primaries {
            if ctx.is_cancelled() {
                return Err(ProviderFailure::timeout("generation cancelled"));
            }
            match adapter.generate(request, ctx).await {
                Ok(result) => {
                    info!(
                        trace_id = %ctx.trace_id,
                        provider = adapter.name(),
                        items = result.items.len(),
                        "chain_provider_succeeded"
                    );
                    return Ok(result);
                }
                Err(failure) => {
                    warn!(
                        trace_id = %ctx.trace_id,
                        provider = adapter.name(),
                        kind = %failure.kind,
                        message = %failure.message,
                        "chain_provider_failed"
                    );
                    first_failure.get_or_insert(failure);
                }
            }
        }

        if ctx.is_cancelled() {
            return Err(ProviderFailure::timeout("generation cancelled"));
        }

        let failure = first_failure.unwrap_or_else(|| {
            ProviderFailure::misconfigured("No primary provider is available")
        });

        match &self.stand_in {
            Some(stand_in) if self.allow_stand_in => {
                warn!(
                    trace_id = %ctx.trace_id,
                    keyword = %request.keyword,
                    reason = %failure.kind,
                    stand_in = stand_in.name(),
                    "chain_fallback_used"
                );
                let mut result = stand_in.stand_in(request, &ctx.trace_id);
                result.degraded = true;
                Ok(result)
            }
            _ => {
                debug!(
                    trace_id = %ctx.trace_id,
                    keyword = %request.keyword,
                    reason = %failure.kind,
                    "chain_fallback_disabled"
                );
                Err(failure)
            }
        }
    }

    fn name(&self) -> &str {
        "fallback-chain"
    }
}

/// Builds a [`FallbackChain`] once at startup from an explicit adapter list
#[derive(Default)]
pub struct ChainBuilder {
    primaries: Vec<Arc<dyn ProviderAdapter>>,
    stand_in: Option<Arc<dyn StandIn>>,
    allow_stand_in: bool,
}

impl ChainBuilder {
    /// Append a primary adapter; order of calls is try order.
    pub fn primary(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.primaries.push(adapter);
        self
    }

    pub fn stand_in(mut self, stand_in: Arc<dyn StandIn>) -> Self {
        self.stand_in = Some(stand_in);
        self
    }

    pub fn allow_stand_in(mut self, allow: bool) -> Self {
        self.allow_stand_in = allow;
        self
    }

    pub fn build(self) -> FallbackChain {
        FallbackChain {
            primaries: self.primaries,
            stand_in: self.stand_in,
            allow_stand_in: self.allow_stand_in,
        }
    }
}
