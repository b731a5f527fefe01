//! Asynchronous generation jobs: records, storage, and the worker-backed orchestrator.

pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod store;

pub use model::{
    CacheInfo, CancelJobResponse, CreateJobResponse, Job, JobError, JobId, JobResultResponse,
    JobStatus, JobStatusResponse, Transition,
};
pub use orchestrator::{JobOrchestrator, OrchestratorConfig};
pub use persistence::SledJobStore;
pub use store::{InMemoryJobStore, InsertOutcome, JobStore, SwapOutcome};
