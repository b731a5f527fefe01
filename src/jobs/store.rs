//! Job Store
//!
//! Durable-enough record of jobs plus two secondary indexes: idempotency key → job and request
//! fingerprint → most recent completed job. Every status change goes through
//! [`JobStore::compare_and_swap_status`], which is the single point of linearization for a job.

use crate::error::StorageError;
use crate::jobs::model::{Job, JobId, JobStatus, Transition};
use crate::types::Fingerprint;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of [`JobStore::insert`]
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The job was stored as given
    Inserted(Job),
    /// Another job already holds the idempotency key; nothing was written
    Existing(Job),
}

/// Outcome of [`JobStore::compare_and_swap_status`]
#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// The transition was applied; carries the updated job
    Swapped(Job),
    /// The job was not in the expected status, or the edge is illegal; carries the current job
    Conflict(Job),
}

/// Job persistence trait
pub trait JobStore: Send + Sync {
    fn get(&self, id: &JobId) -> Result<Option<Job>, StorageError>;

    /// Store a new job. If the job carries an idempotency key already claimed by another job,
    /// nothing is written and the owner is returned. Claim and insert are one atomic step.
    ///
    /// A job inserted as `completed` becomes the fingerprint index entry for its request.
    fn insert(&self, job: Job) -> Result<InsertOutcome, StorageError>;

    /// Apply `transition` only if the job's current status equals `expected` and the edge is
    /// legal. A transition to `completed` also points the fingerprint index at the job.
    fn compare_and_swap_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        transition: Transition,
    ) -> Result<SwapOutcome, StorageError>;

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Job>, StorageError>;

    /// Most recent completed job for a request fingerprint
    fn latest_completed(&self, fingerprint: &Fingerprint) -> Result<Option<Job>, StorageError>;
}

#[derive(Default)]
struct Indexes {
    by_idempotency_key: HashMap<String, JobId>,
    by_fingerprint: HashMap<Fingerprint, JobId>,
}

/// In-process store. The map lock is held only for lookup and insert; each job has its own lock.
///
/// Lock order: a job lock may be held while taking `indexes`, never the reverse.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
    indexes: Mutex<Indexes>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &JobId) -> Option<Arc<Mutex<Job>>> {
        self.jobs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn get(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        Ok(self.slot(id).map(|slot| slot.lock().clone()))
    }

    fn insert(&self, job: Job) -> Result<InsertOutcome, StorageError> {
        let existing = {
            let mut indexes = self.indexes.lock();
            let owner = job
                .idempotency_key
                .as_ref()
                .and_then(|key| indexes.by_idempotency_key.get(key).copied());
            match owner {
                Some(owner) => Some(owner),
                None => {
                    if let Some(key) = &job.idempotency_key {
                        indexes.by_idempotency_key.insert(key.clone(), job.id);
                    }
                    // The job becomes visible before the idempotency lock is released, so a
                    // racing create that finds the key can always read the owner.
                    self.jobs
                        .write()
                        .insert(job.id, Arc::new(Mutex::new(job.clone())));
                    if job.status == JobStatus::Completed {
                        indexes
                            .by_fingerprint
                            .insert(job.request_fingerprint.clone(), job.id);
                    }
                    None
                }
            }
        };

        match existing {
            Some(owner) => self
                .get(&owner)?
                .map(InsertOutcome::Existing)
                .ok_or_else(|| StorageError::MissingRecord(owner.to_string())),
            None => Ok(InsertOutcome::Inserted(job)),
        }
    }

    fn compare_and_swap_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        transition: Transition,
    ) -> Result<SwapOutcome, StorageError> {
        let slot = self
            .slot(id)
            .ok_or_else(|| StorageError::MissingRecord(id.to_string()))?;

        let mut job = slot.lock();
        if job.status != expected || !expected.can_transition_to(transition.target()) {
            return Ok(SwapOutcome::Conflict(job.clone()));
        }
        job.apply(transition, Utc::now());
        // Index before the job lock is released so a reader that sees `completed` also finds it
        // through its fingerprint.
        if job.status == JobStatus::Completed {
            self.indexes
                .lock()
                .by_fingerprint
                .insert(job.request_fingerprint.clone(), job.id);
        }
        Ok(SwapOutcome::Swapped(job.clone()))
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Job>, StorageError> {
        let owner = self.indexes.lock().by_idempotency_key.get(key).copied();
        match owner {
            Some(id) => self.get(&id),
            None => Ok(None),
        }
    }

    fn latest_completed(&self, fingerprint: &Fingerprint) -> Result<Option<Job>, StorageError> {
        let id = self.indexes.lock().by_fingerprint.get(fingerprint).copied();
        match id {
            Some(id) => Ok(self
                .get(&id)?
                .filter(|job| job.status == JobStatus::Completed && job.result.is_some())),
            None => Ok(None),
        }
    }
}
