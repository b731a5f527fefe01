//! Integration tests for the job orchestrator
//!
//! Tests cover:
//! - Idempotent replay, including concurrent creates with one key
//! - Result reuse by request fingerprint
//! - Cancellation of queued and running jobs
//! - Failure records and retry hints
//! - Read consistency while cancels race completion

use super::test_utils::FakeAdapter;
use genrelay::chain::FallbackChain;
use genrelay::error::{FailureKind, ProviderFailure, StorageError};
use genrelay::jobs::{
    InMemoryJobStore, InsertOutcome, Job, JobId, JobOrchestrator, JobResultResponse, JobStatus,
    JobStore, OrchestratorConfig, SwapOutcome, Transition,
};
use genrelay::provider::{ProviderAdapter, StubGenerator};
use genrelay::types::{Fingerprint, GenerationRequest};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn orchestrator(chain: Arc<dyn ProviderAdapter>) -> JobOrchestrator {
    JobOrchestrator::new(
        Arc::new(InMemoryJobStore::new()),
        chain,
        OrchestratorConfig::default(),
    )
}

#[tokio::test]
async fn test_same_key_same_job_different_key_new_job() {
    let adapter = FakeAdapter::succeeding("fake", 1);
    let orch = orchestrator(adapter.clone());
    orch.start();

    let first = orch
        .create(GenerationRequest::new("AI"), Some("key-a".to_string()))
        .unwrap();
    let replay = orch
        .create(GenerationRequest::new("AI"), Some("key-a".to_string()))
        .unwrap();
    assert_eq!(replay.job_id, first.job_id);
    assert_eq!(replay.trace_id, first.trace_id);

    let other = orch
        .create(GenerationRequest::new("AI"), Some("key-b".to_string()))
        .unwrap();
    assert_ne!(other.job_id, first.job_id);

    orch.wait_for_terminal(&first.job_id, WAIT).await.unwrap();
    orch.wait_for_terminal(&other.job_id, WAIT).await.unwrap();
    orch.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_with_one_key_execute_once() {
    let adapter = FakeAdapter::succeeding("fake", 1);
    let orch = Arc::new(orchestrator(adapter.clone()));
    orch.start();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orch = Arc::clone(&orch);
            std::thread::spawn(move || {
                orch.create(GenerationRequest::new("race"), Some("shared".to_string()))
                    .unwrap()
                    .job_id
            })
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.iter().all(|id| *id == ids[0]));

    orch.wait_for_terminal(&ids[0], WAIT).await.unwrap();
    assert_eq!(adapter.calls(), 1);
    orch.stop().await;
}

#[tokio::test]
async fn test_fingerprint_match_serves_cached_result_without_provider_call() {
    let adapter = FakeAdapter::succeeding("fake", 2);
    let orch = orchestrator(adapter.clone());
    orch.start();

    let request = GenerationRequest::new("AI").with_max_items(2);
    let first = orch.create(request.clone(), None).unwrap();
    orch.wait_for_terminal(&first.job_id, WAIT).await.unwrap();
    let original = orch.result(&first.job_id).unwrap();

    let cached = orch.create(request, None).unwrap();
    assert_ne!(cached.job_id, first.job_id);
    assert_eq!(cached.status, JobStatus::Completed);

    let served = orch.result(&cached.job_id).unwrap();
    let cache = served.cache.unwrap();
    assert!(cache.hit);
    assert_eq!(cache.ttl_sec, 180);
    let served_result = served.result.unwrap();
    let original_result = original.result.unwrap();
    assert!(served_result.usage.cache_hit);
    assert_eq!(served_result.items, original_result.items);
    assert_eq!(served_result.summary, original_result.summary);
    assert_eq!(adapter.calls(), 1);

    // A different parameter is a different fingerprint.
    let fresh = orch
        .create(GenerationRequest::new("AI").with_max_items(3), None)
        .unwrap();
    assert_eq!(fresh.status, JobStatus::Queued);
    orch.wait_for_terminal(&fresh.job_id, WAIT).await.unwrap();
    assert_eq!(adapter.calls(), 2);
    orch.stop().await;
}

#[tokio::test]
async fn test_cancel_queued_and_completed_jobs() {
    let orch = orchestrator(FakeAdapter::succeeding("fake", 1));

    // Workers not started: the job stays queued.
    let queued = orch.create(GenerationRequest::new("queued"), None).unwrap();
    let cancelled = orch.cancel(&queued.job_id).unwrap();
    assert!(cancelled.cancelled);
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    orch.start();
    let done = orch.create(GenerationRequest::new("done"), None).unwrap();
    orch.wait_for_terminal(&done.job_id, WAIT).await.unwrap();
    let before = orch.status(&done.job_id).unwrap();

    let noop = orch.cancel(&done.job_id).unwrap();
    assert!(!noop.cancelled);
    assert_eq!(noop.status, JobStatus::Completed);
    assert_eq!(orch.status(&done.job_id).unwrap(), before);

    // The cancelled job is never picked up.
    assert_eq!(
        orch.status(&queued.job_id).unwrap().status,
        JobStatus::Cancelled
    );
    orch.stop().await;
}

#[tokio::test]
async fn test_cancel_running_job_discards_result() {
    let adapter = FakeAdapter::slow("slow", Duration::from_secs(30));
    let orch = orchestrator(adapter.clone());
    orch.start();

    let created = orch.create(GenerationRequest::new("AI"), None).unwrap();
    let start = Instant::now();
    while orch.status(&created.job_id).unwrap().status != JobStatus::Running {
        assert!(start.elapsed() < WAIT, "job never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let response = orch.cancel(&created.job_id).unwrap();
    assert!(response.cancelled);

    // Give the worker time to observe cancellation and attempt its transition.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let result = orch.result(&created.job_id).unwrap();
    assert_eq!(result.status, JobStatus::Cancelled);
    assert!(result.result.is_none());
    assert!(result.error.is_none());
    orch.stop().await;
}

#[tokio::test]
async fn test_failed_job_records_classified_error() {
    let chain = FallbackChain::builder()
        .primary(FakeAdapter::failing(
            "a",
            ProviderFailure::upstream("502 Bad Gateway"),
        ))
        .primary(FakeAdapter::failing("b", ProviderFailure::timeout("slow")))
        .stand_in(Arc::new(StubGenerator::new()))
        .allow_stand_in(false)
        .build();
    let orch = orchestrator(Arc::new(chain));
    orch.start();

    let created = orch.create(GenerationRequest::new("AI"), None).unwrap();
    let status = orch.wait_for_terminal(&created.job_id, WAIT).await.unwrap();
    assert_eq!(status.status, JobStatus::Failed);

    let error = status.error.unwrap();
    assert_eq!(error.code, "GENERATION_FAILED");
    assert_eq!(error.kind, FailureKind::UpstreamServerError);
    assert!(error.retryable);
    assert_eq!(error.retry_after_secs, Some(5));
    assert_eq!(error.trace_id, created.trace_id);

    // Failed jobs never seed the cache.
    let again = orch.create(GenerationRequest::new("AI"), None).unwrap();
    assert_eq!(again.status, JobStatus::Queued);
    orch.stop().await;
}

#[tokio::test]
async fn test_degraded_result_is_completed_job() {
    let chain = FallbackChain::builder()
        .primary(FakeAdapter::failing("a", ProviderFailure::rate_limited("429")))
        .stand_in(Arc::new(StubGenerator::new()))
        .allow_stand_in(true)
        .build();
    let orch = orchestrator(Arc::new(chain));
    orch.start();

    let created = orch.create(GenerationRequest::new("AI"), None).unwrap();
    orch.wait_for_terminal(&created.job_id, WAIT).await.unwrap();
    let result = orch.result(&created.job_id).unwrap();
    assert_eq!(result.status, JobStatus::Completed);
    assert!(result.result.unwrap().degraded);
    orch.stop().await;
}

/// In-memory store that cancels a job as soon as a worker moves it to running
#[derive(Default)]
struct CancelOnStart {
    inner: InMemoryJobStore,
    orchestrator: OnceLock<Weak<JobOrchestrator>>,
}

impl JobStore for CancelOnStart {
    fn get(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        self.inner.get(id)
    }

    fn insert(&self, job: Job) -> Result<InsertOutcome, StorageError> {
        self.inner.insert(job)
    }

    fn compare_and_swap_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        transition: Transition,
    ) -> Result<SwapOutcome, StorageError> {
        let starting = matches!(transition, Transition::Start);
        let outcome = self.inner.compare_and_swap_status(id, expected, transition)?;
        if starting && matches!(outcome, SwapOutcome::Swapped(_)) {
            if let Some(orch) = self.orchestrator.get().and_then(Weak::upgrade) {
                let response = orch
                    .cancel(id)
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                assert!(response.cancelled);
            }
        }
        Ok(outcome)
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Job>, StorageError> {
        self.inner.find_by_idempotency_key(key)
    }

    fn latest_completed(&self, fingerprint: &Fingerprint) -> Result<Option<Job>, StorageError> {
        self.inner.latest_completed(fingerprint)
    }
}

#[tokio::test]
async fn test_cancel_right_after_start_reaches_provider_call() {
    let store = Arc::new(CancelOnStart::default());
    let orch = Arc::new(JobOrchestrator::new(
        store.clone(),
        FakeAdapter::slow("slow", Duration::from_secs(10)),
        OrchestratorConfig::default(),
    ));
    let _ = store.orchestrator.set(Arc::downgrade(&orch));
    orch.start();

    let created = orch.create(GenerationRequest::new("AI"), None).unwrap();
    let status = orch.wait_for_terminal(&created.job_id, WAIT).await.unwrap();
    assert_eq!(status.status, JobStatus::Cancelled);

    // Stop waits for in-flight work, so it only returns early if the call saw the cancel.
    let stopping = Instant::now();
    orch.stop().await;
    assert!(
        stopping.elapsed() < Duration::from_secs(2),
        "provider call kept running for {:?} after cancel",
        stopping.elapsed()
    );
    assert!(orch.result(&created.job_id).unwrap().result.is_none());
}

fn assert_consistent(read: &JobResultResponse) {
    match read.status {
        JobStatus::Completed => assert!(read.result.is_some() && read.error.is_none()),
        JobStatus::Failed => assert!(read.result.is_none() && read.error.is_some()),
        JobStatus::Queued | JobStatus::Running | JobStatus::Cancelled => {
            assert!(read.result.is_none() && read.error.is_none())
        }
    }
}

fn progress(status: JobStatus) -> u8 {
    match status {
        JobStatus::Queued => 0,
        JobStatus::Running => 1,
        _ => 2,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_stay_consistent_while_cancels_race_completion() {
    let orch = Arc::new(JobOrchestrator::new(
        Arc::new(InMemoryJobStore::new()),
        FakeAdapter::slow("quick", Duration::from_millis(3)),
        OrchestratorConfig {
            workers: 4,
            ..OrchestratorConfig::default()
        },
    ));
    orch.start();

    let ids: Vec<JobId> = (0..48)
        .map(|i| {
            orch.create(GenerationRequest::new(format!("topic-{}", i)), None)
                .unwrap()
                .job_id
        })
        .collect();

    let readers: Vec<_> = ids
        .iter()
        .map(|&id| {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move {
                let deadline = Instant::now() + WAIT;
                let mut last = orch.result(&id).unwrap();
                assert_consistent(&last);
                while !last.status.is_terminal() {
                    assert!(Instant::now() < deadline, "job {} never settled", id);
                    tokio::task::yield_now().await;
                    let read = orch.result(&id).unwrap();
                    assert_consistent(&read);
                    assert!(progress(read.status) >= progress(last.status));
                    last = read;
                }
                // A terminal status never changes.
                for _ in 0..10 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    let read = orch.result(&id).unwrap();
                    assert_consistent(&read);
                    assert_eq!(read.status, last.status);
                }
                last.status
            })
        })
        .collect();

    let cancels: Vec<_> = ids
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(i, &id)| {
            let orch = Arc::clone(&orch);
            let offset = Duration::from_micros((i as u64 * 397) % 6000);
            tokio::spawn(async move {
                tokio::time::sleep(offset).await;
                orch.cancel(&id).unwrap()
            })
        })
        .collect();

    let mut cancel_responses = HashMap::new();
    for cancel in cancels {
        let response = cancel.await.unwrap();
        cancel_responses.insert(response.job_id, response);
    }

    for (id, reader) in ids.iter().zip(readers) {
        let settled = reader.await.unwrap();
        match cancel_responses.get(id) {
            Some(response) if response.cancelled => assert_eq!(settled, JobStatus::Cancelled),
            Some(response) => assert_eq!(settled, response.status),
            None => assert_eq!(settled, JobStatus::Completed),
        }
    }
    orch.stop().await;
}
