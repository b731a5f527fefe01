//! CLI route: single route table and run context. Dispatches to the generation service and
//! output formatting.

use crate::cli::output::{format_providers_json, format_providers_text, to_pretty_json};
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, GenrelayConfig};
use crate::error::ApiError;
use crate::jobs::JobId;
use crate::service::GenerationService;
use crate::types::GenerationRequest;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

/// Runtime context for CLI execution: loaded config, the tokio runtime, and the service.
pub struct RunContext {
    config: GenrelayConfig,
    runtime: Runtime,
    service: GenerationService,
}

impl RunContext {
    /// Load configuration (explicit path or ./genrelay.toml, then env) and build the service.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Self::from_config(config)
    }

    pub fn from_config(config: GenrelayConfig) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to start runtime: {}", e)))?;
        let service = GenerationService::from_config(&config)?;
        Ok(Self {
            config,
            runtime,
            service,
        })
    }

    pub fn config(&self) -> &GenrelayConfig {
        &self.config
    }

    /// Execute one command and return its printable output.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Run { request, trace_id } => {
                let response = self
                    .runtime
                    .block_on(self.service.run(request.to_request(), trace_id.clone()))?;
                to_pretty_json(&response)
            }
            Commands::Submit {
                request,
                idempotency_key,
                wait,
                timeout_secs,
            } => self.runtime.block_on(async {
                self.service.start();
                let outcome = self
                    .submit(
                        request.to_request(),
                        idempotency_key.clone(),
                        *wait,
                        Duration::from_secs(*timeout_secs),
                    )
                    .await;
                self.service.stop().await;
                outcome
            }),
            Commands::Status { job_id } => {
                to_pretty_json(&self.service.job_status(&parse_job_id(job_id)?)?)
            }
            Commands::Result { job_id } => {
                to_pretty_json(&self.service.job_result(&parse_job_id(job_id)?)?)
            }
            Commands::Cancel { job_id } => {
                to_pretty_json(&self.service.cancel_job(&parse_job_id(job_id)?)?)
            }
            Commands::Providers { format } => match format.as_str() {
                "json" => format_providers_json(&self.config),
                "text" => Ok(format_providers_text(&self.config)),
                other => Err(ApiError::InvalidRequest(format!(
                    "Invalid format: {} (must be 'text' or 'json')",
                    other
                ))),
            },
        }
    }

    async fn submit(
        &self,
        request: GenerationRequest,
        idempotency_key: Option<String>,
        wait: bool,
        timeout: Duration,
    ) -> Result<String, ApiError> {
        let created = self.service.create_job(request, idempotency_key)?;
        debug!(job_id = %created.job_id, status = %created.status, "job_submitted");
        if !wait {
            return to_pretty_json(&created);
        }
        self.service.wait_for_job(&created.job_id, timeout).await?;
        to_pretty_json(&self.service.job_result(&created.job_id)?)
    }
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw).ok_or_else(|| ApiError::InvalidRequest(format!("Invalid job id: {}", raw)))
}
