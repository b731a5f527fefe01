//! Integration tests for the orchestrator over the sled job store

use super::test_utils::FakeAdapter;
use genrelay::jobs::{JobOrchestrator, JobStatus, JobStore, OrchestratorConfig, SledJobStore};
use genrelay::types::GenerationRequest;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_completed_job_and_indexes_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("jobs");
    let request = GenerationRequest::new("AI").with_max_items(3);

    let (job_id, trace_id) = {
        let store = Arc::new(SledJobStore::new(&path).unwrap());
        let orch = JobOrchestrator::new(
            store.clone(),
            FakeAdapter::succeeding("fake", 3),
            OrchestratorConfig::default(),
        );
        orch.start();
        let created = orch
            .create(request.clone(), Some("persist-key".to_string()))
            .unwrap();
        let status = orch.wait_for_terminal(&created.job_id, WAIT).await.unwrap();
        assert_eq!(status.status, JobStatus::Completed);
        orch.stop().await;
        store.flush().unwrap();
        (created.job_id, created.trace_id)
    };

    let store = Arc::new(SledJobStore::new(&path).unwrap());
    let job = store.get(&job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.trace_id, trace_id);

    let adapter = FakeAdapter::succeeding("fake", 3);
    let orch = JobOrchestrator::new(store, adapter.clone(), OrchestratorConfig::default());

    // Replay by key, then a cache hit by fingerprint, without any provider call.
    let replay = orch
        .create(request.clone(), Some("persist-key".to_string()))
        .unwrap();
    assert_eq!(replay.job_id, job_id);

    let cached = orch.create(request, None).unwrap();
    assert_ne!(cached.job_id, job_id);
    assert_eq!(cached.status, JobStatus::Completed);
    let served = orch.result(&cached.job_id).unwrap();
    assert!(served.cache.unwrap().hit);
    assert_eq!(served.result.unwrap().items.len(), 3);
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn test_cancelled_job_is_persisted_and_never_cached() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledJobStore::new(dir.path().join("jobs")).unwrap());
    let adapter = FakeAdapter::succeeding("fake", 1);
    let orch = JobOrchestrator::new(store.clone(), adapter.clone(), OrchestratorConfig::default());

    let created = orch.create(GenerationRequest::new("AI"), None).unwrap();
    assert!(orch.cancel(&created.job_id).unwrap().cancelled);
    assert_eq!(
        store.get(&created.job_id).unwrap().unwrap().status,
        JobStatus::Cancelled
    );

    // Workers start after the cancel and skip the job.
    orch.start();
    let next = orch.create(GenerationRequest::new("AI"), None).unwrap();
    assert_eq!(next.status, JobStatus::Queued);
    orch.wait_for_terminal(&next.job_id, WAIT).await.unwrap();
    orch.stop().await;

    assert_eq!(adapter.calls(), 1);
    assert_eq!(
        orch.status(&created.job_id).unwrap().status,
        JobStatus::Cancelled
    );
}
