//! Job Orchestrator
//!
//! Accepts generation requests as jobs, resolves idempotent replays and cached results at creation,
//! and runs everything else on a fixed pool of background workers through the fallback chain.
//! Creation never waits on provider I/O.

use crate::error::{ApiError, ProviderFailure};
use crate::jobs::model::{
    CancelJobResponse, CreateJobResponse, Job, JobError, JobId, JobResultResponse, JobStatus,
    JobStatusResponse, Transition,
};
use crate::jobs::store::{InsertOutcome, JobStore, SwapOutcome};
use crate::provider::{CallContext, ProviderAdapter};
use crate::types::{GenerationRequest, Usage};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Worker pool and job policy settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub workers: usize,
    pub cache_ttl_secs: u64,
    pub retry_after_secs: u64,
    pub rate_limit_retry_after_secs: u64,
    pub max_items_limit: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            cache_ttl_secs: 180,
            retry_after_secs: 5,
            rate_limit_retry_after_secs: 30,
            max_items_limit: 20,
        }
    }
}

struct Shared {
    store: Arc<dyn JobStore>,
    chain: Arc<dyn ProviderAdapter>,
    config: OrchestratorConfig,
    /// Cancellation handles for jobs that are queued or running in this process
    handles: Mutex<HashMap<JobId, CancellationToken>>,
    queue: Mutex<VecDeque<JobId>>,
    notify: Notify,
    running: RwLock<bool>,
}

/// Async job front end over a [`JobStore`] and a provider chain
pub struct JobOrchestrator {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobOrchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        chain: Arc<dyn ProviderAdapter>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                chain,
                config,
                handles: Mutex::new(HashMap::new()),
                queue: Mutex::new(VecDeque::new()),
                notify: Notify::new(),
                running: RwLock::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// Start background workers. Must be called inside a tokio runtime.
    pub fn start(&self) {
        let mut running = self.shared.running.write();
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let mut workers = self.workers.lock();
        for worker_id in 0..self.shared.config.workers.max(1) {
            let shared = Arc::clone(&self.shared);
            workers.push(tokio::spawn(async move {
                Self::worker_loop(worker_id, shared).await;
            }));
        }
        info!(worker_count = workers.len(), "Started job workers");
    }

    /// Stop background workers (graceful shutdown). In-flight jobs finish first.
    pub async fn stop(&self) {
        let mut running = self.shared.running.write();
        if !*running {
            return;
        }
        *running = false;
        drop(running);
        self.shared.notify.notify_waiters();

        let workers = std::mem::take(&mut *self.workers.lock());
        for joined in join_all(workers).await {
            if let Err(e) = joined {
                warn!(error = %e, "Job worker exited abnormally");
            }
        }
        info!("Stopped job workers");
    }

    /// Accept a request. Returns the job id, its current status and trace id.
    ///
    /// A known idempotency key replays the original job. A request whose fingerprint matches a
    /// prior completed job yields a new job completed from that result. Anything else is queued.
    pub fn create(
        &self,
        request: GenerationRequest,
        idempotency_key: Option<String>,
    ) -> Result<CreateJobResponse, ApiError> {
        request
            .validate(self.shared.config.max_items_limit)
            .map_err(ApiError::InvalidRequest)?;
        let idempotency_key = idempotency_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.shared.store.find_by_idempotency_key(key)? {
                debug!(job_id = %existing.id, idempotency_key = %key, "job_replayed");
                return Ok(Self::create_response(&existing));
            }
        }

        let trace_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let candidate = match self.shared.store.latest_completed(&request.fingerprint())? {
            Some(Job {
                result: Some(cached),
                id: source,
                ..
            }) => {
                info!(trace_id = %trace_id, source_job = %source, "job_served_from_cache");
                Job::from_cache(request, trace_id, idempotency_key, cached, now)
            }
            _ => Job::queued(request, trace_id, idempotency_key, now),
        };

        match self.shared.store.insert(candidate)? {
            InsertOutcome::Existing(existing) => {
                debug!(job_id = %existing.id, "job_replayed_after_race");
                Ok(Self::create_response(&existing))
            }
            InsertOutcome::Inserted(job) => {
                if job.status == JobStatus::Queued {
                    self.dispatch(job.id);
                }
                info!(
                    job_id = %job.id,
                    trace_id = %job.trace_id,
                    status = %job.status,
                    keyword = %job.request.keyword,
                    "job_created"
                );
                Ok(Self::create_response(&job))
            }
        }
    }

    pub fn status(&self, id: &JobId) -> Result<JobStatusResponse, ApiError> {
        Ok(self.load(id)?.status_response())
    }

    pub fn result(&self, id: &JobId) -> Result<JobResultResponse, ApiError> {
        Ok(self
            .load(id)?
            .result_response(self.shared.config.cache_ttl_secs))
    }

    /// Cancel a queued or running job. A terminal job is left as is and reported with
    /// `cancelled = false`.
    pub fn cancel(&self, id: &JobId) -> Result<CancelJobResponse, ApiError> {
        let mut current = self.load(id)?;
        loop {
            if current.status.is_terminal() {
                debug!(job_id = %id, status = %current.status, "job_cancel_noop");
                return Ok(CancelJobResponse {
                    job_id: current.id,
                    status: current.status,
                    cancelled: false,
                });
            }
            match self
                .shared
                .store
                .compare_and_swap_status(id, current.status, Transition::Cancel)?
            {
                SwapOutcome::Swapped(job) => {
                    // The worker drops the handle once it is done with the job.
                    if let Some(token) = self.shared.handles.lock().get(id) {
                        token.cancel();
                    }
                    info!(job_id = %id, trace_id = %job.trace_id, "job_cancelled");
                    return Ok(CancelJobResponse {
                        job_id: job.id,
                        status: job.status,
                        cancelled: true,
                    });
                }
                SwapOutcome::Conflict(latest) => current = latest,
            }
        }
    }

    /// Poll until the job reaches a terminal status or `timeout` elapses.
    pub async fn wait_for_terminal(
        &self,
        id: &JobId,
        timeout: Duration,
    ) -> Result<JobStatusResponse, ApiError> {
        let start = Instant::now();
        loop {
            let job = self.load(id)?;
            if job.status.is_terminal() {
                return Ok(job.status_response());
            }
            if start.elapsed() >= timeout {
                return Err(ApiError::WaitTimeout(format!(
                    "job {} still {} after {:?}",
                    id, job.status, timeout
                )));
            }
            sleep(Duration::from_millis(25)).await;
        }
    }

    fn load(&self, id: &JobId) -> Result<Job, ApiError> {
        self.shared
            .store
            .get(id)?
            .ok_or_else(|| ApiError::JobNotFound(id.to_string()))
    }

    fn create_response(job: &Job) -> CreateJobResponse {
        CreateJobResponse {
            job_id: job.id,
            status: job.status,
            trace_id: job.trace_id.clone(),
        }
    }

    fn dispatch(&self, id: JobId) {
        self.shared
            .handles
            .lock()
            .insert(id, CancellationToken::new());
        self.shared.queue.lock().push_back(id);
        self.shared.notify.notify_one();
    }

    async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
        debug!(worker_id, "Worker started");

        while *shared.running.read() {
            let next = shared.queue.lock().pop_front();
            let Some(id) = next else {
                // Wake on dispatch, or periodically to observe shutdown.
                tokio::select! {
                    _ = shared.notify.notified() => continue,
                    _ = sleep(Duration::from_millis(100)) => continue,
                }
            };

            if let Err(err) = Self::execute(&shared, id).await {
                error!(worker_id, job_id = %id, error = %err, "job_execution_error");
            }
            shared.handles.lock().remove(&id);
        }

        debug!(worker_id, "Worker stopped");
    }

    async fn execute(shared: &Shared, id: JobId) -> Result<(), ApiError> {
        // Taken before the start CAS so a cancel landing right after it still reaches the call.
        // A missing handle means nothing can signal this job any more; run it as cancelled.
        let token = shared
            .handles
            .lock()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| {
                let token = CancellationToken::new();
                token.cancel();
                token
            });
        let job = match shared
            .store
            .compare_and_swap_status(&id, JobStatus::Queued, Transition::Start)?
        {
            SwapOutcome::Swapped(job) => job,
            SwapOutcome::Conflict(job) => {
                debug!(job_id = %id, status = %job.status, "job_skipped");
                return Ok(());
            }
        };
        info!(job_id = %id, trace_id = %job.trace_id, "job_started");
        let ctx = CallContext::with_cancellation(job.trace_id.clone(), token.clone());
        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            outcome = shared.chain.generate(&job.request, &ctx) => Some(outcome),
        };

        let transition = match outcome {
            None => {
                // Cancel already moved the job to `cancelled`; the CAS below will conflict.
                Transition::Cancel
            }
            Some(Ok(result)) => Transition::Complete(result.with_cache_hit(false)),
            Some(Err(failure)) => {
                Transition::Fail(Self::job_error(shared, &failure, &job, started.elapsed()))
            }
        };
        let target = transition.target();

        match shared
            .store
            .compare_and_swap_status(&id, JobStatus::Running, transition)?
        {
            SwapOutcome::Swapped(done) => match &done.error {
                Some(err) => warn!(
                    job_id = %id,
                    trace_id = %done.trace_id,
                    kind = %err.kind,
                    retryable = err.retryable,
                    "job_failed"
                ),
                None => info!(
                    job_id = %id,
                    trace_id = %done.trace_id,
                    status = %done.status,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "job_finished"
                ),
            },
            SwapOutcome::Conflict(current) => {
                debug!(
                    job_id = %id,
                    attempted = %target,
                    status = %current.status,
                    "job_result_discarded"
                );
            }
        }
        Ok(())
    }

    fn job_error(
        shared: &Shared,
        failure: &ProviderFailure,
        job: &Job,
        elapsed: Duration,
    ) -> JobError {
        JobError::from_failure(
            failure,
            &job.trace_id,
            Usage {
                provider_calls: 0,
                latency_ms: elapsed.as_millis() as u64,
                cache_hit: false,
            },
            shared.config.retry_after_secs,
            shared.config.rate_limit_retry_after_secs,
        )
    }
}
