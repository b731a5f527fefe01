//! Generation service: the process-wide wiring of adapters, fallback chain, job store, and
//! orchestrator, plus the synchronous `run` path.

use crate::chain::FallbackChain;
use crate::config::{GenrelayConfig, StoreBackend};
use crate::error::ApiError;
use crate::jobs::{
    CancelJobResponse, CreateJobResponse, InMemoryJobStore, JobId, JobOrchestrator,
    JobResultResponse, JobStatusResponse, JobStore, OrchestratorConfig, SledJobStore,
};
use crate::provider::{
    CallContext, ExternalAdapter, OpenAiAdapter, ProviderAdapter, StubGenerator,
};
use crate::types::{ContentItem, GenerationRequest, Summary, Usage};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Response of a synchronous generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub trace_id: String,
    /// `completed`, or `degraded` when the stub answered
    pub status: String,
    pub generated_at: String,
    pub query: GenerationRequest,
    pub provider: String,
    pub items: Vec<ContentItem>,
    pub summary: Summary,
    pub usage: Usage,
}

pub struct GenerationService {
    chain: Arc<dyn ProviderAdapter>,
    orchestrator: JobOrchestrator,
}

impl GenerationService {
    pub fn new(
        chain: Arc<dyn ProviderAdapter>,
        store: Arc<dyn JobStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let orchestrator = JobOrchestrator::new(store, Arc::clone(&chain), config);
        Self {
            chain,
            orchestrator,
        }
    }

    /// Build adapters, chain, and store from configuration. Workers are not started.
    pub fn from_config(config: &GenrelayConfig) -> Result<Self, ApiError> {
        config.ensure_valid()?;
        let chain = build_chain(config)?;
        let store: Arc<dyn JobStore> = match config.jobs.store {
            StoreBackend::Memory => Arc::new(InMemoryJobStore::new()),
            StoreBackend::Sled => {
                let path = config.jobs.resolve_store_path();
                info!(store_path = %path.display(), "Opening sled job store");
                Arc::new(SledJobStore::new(path)?)
            }
        };
        Ok(Self::new(
            Arc::new(chain),
            store,
            config.jobs.orchestrator_config(),
        ))
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    pub fn start(&self) {
        self.orchestrator.start();
    }

    pub async fn stop(&self) {
        self.orchestrator.stop().await;
    }

    /// Generate synchronously through the chain, bypassing jobs and the cache.
    pub async fn run(
        &self,
        request: GenerationRequest,
        trace_id: Option<String>,
    ) -> Result<RunResponse, ApiError> {
        request
            .validate(self.orchestrator.config().max_items_limit)
            .map_err(ApiError::InvalidRequest)?;
        let trace_id = trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let ctx = CallContext::new(trace_id.clone());

        let result = self.chain.generate(&request, &ctx).await?;
        info!(
            trace_id = %trace_id,
            provider = %result.provider,
            degraded = result.degraded,
            items = result.items.len(),
            "run_completed"
        );

        Ok(RunResponse {
            trace_id,
            status: if result.degraded {
                "degraded".to_string()
            } else {
                "completed".to_string()
            },
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            query: request,
            provider: result.provider,
            items: result.items,
            summary: result.summary,
            usage: result.usage,
        })
    }

    pub fn create_job(
        &self,
        request: GenerationRequest,
        idempotency_key: Option<String>,
    ) -> Result<CreateJobResponse, ApiError> {
        self.orchestrator.create(request, idempotency_key)
    }

    pub fn job_status(&self, id: &JobId) -> Result<JobStatusResponse, ApiError> {
        self.orchestrator.status(id)
    }

    pub fn job_result(&self, id: &JobId) -> Result<JobResultResponse, ApiError> {
        self.orchestrator.result(id)
    }

    pub fn cancel_job(&self, id: &JobId) -> Result<CancelJobResponse, ApiError> {
        self.orchestrator.cancel(id)
    }

    pub async fn wait_for_job(
        &self,
        id: &JobId,
        timeout: Duration,
    ) -> Result<JobStatusResponse, ApiError> {
        self.orchestrator.wait_for_terminal(id, timeout).await
    }
}

/// Explicit adapter order: OpenAI when enabled, then the external endpoint when configured, then
/// the stub if fallback is allowed.
pub fn build_chain(config: &GenrelayConfig) -> Result<FallbackChain, ApiError> {
    let mut builder = FallbackChain::builder();
    if config.providers.openai.enabled {
        builder = builder.primary(Arc::new(OpenAiAdapter::new(
            config.providers.openai.clone(),
        )?));
    }
    if config.providers.external.is_configured() {
        builder = builder.primary(Arc::new(ExternalAdapter::new(
            config.providers.external.clone(),
        )?));
    }
    Ok(builder
        .stand_in(Arc::new(StubGenerator::new()))
        .allow_stand_in(config.fallback.allow_stub_fallback)
        .build())
}
