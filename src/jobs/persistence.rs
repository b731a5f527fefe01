//! Persistence layer for the Job Store

use crate::error::StorageError;
use crate::jobs::model::{Job, JobId, JobStatus, Transition};
use crate::jobs::store::{InsertOutcome, JobStore, SwapOutcome};
use crate::types::Fingerprint;
use chrono::Utc;
use sled::IVec;
use std::path::Path;
use tracing::debug;

const JOB_PREFIX: &str = "job:";
const IDEMPOTENCY_PREFIX: &str = "idem:";
const FINGERPRINT_PREFIX: &str = "fp:";

/// Sled-based implementation of JobStore
///
/// Records are JSON under `job:<id>`. The idempotency index lives under `idem:<key>` and the
/// fingerprint index under `fp:<fingerprint>`, both holding the job id as UTF-8.
pub struct SledJobStore {
    db: sled::Db,
}

impl SledJobStore {
    /// Open (or create) a store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;
        Ok(Self { db })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn job_key(id: &JobId) -> String {
        format!("{}{}", JOB_PREFIX, id)
    }

    fn idempotency_key(key: &str) -> String {
        format!("{}{}", IDEMPOTENCY_PREFIX, key)
    }

    fn fingerprint_key(fingerprint: &Fingerprint) -> String {
        format!("{}{}", FINGERPRINT_PREFIX, fingerprint)
    }

    fn decode(bytes: &[u8]) -> Result<Job, StorageError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn decode_id(bytes: &[u8]) -> Result<JobId, StorageError> {
        let raw = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Backend(format!("Invalid job id in index: {}", e)))?;
        JobId::parse(raw)
            .ok_or_else(|| StorageError::Backend(format!("Invalid job id in index: {}", raw)))
    }

    fn point_fingerprint(&self, job: &Job) -> Result<(), StorageError> {
        self.db.insert(
            Self::fingerprint_key(&job.request_fingerprint),
            job.id.to_string().as_bytes(),
        )?;
        Ok(())
    }

    fn lookup_index(&self, key: String) -> Result<Option<Job>, StorageError> {
        match self.db.get(key)? {
            Some(raw) => {
                let id = Self::decode_id(&raw)?;
                self.get(&id)
            }
            None => Ok(None),
        }
    }
}

impl JobStore for SledJobStore {
    fn get(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        match self.db.get(Self::job_key(id))? {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, job: Job) -> Result<InsertOutcome, StorageError> {
        let job_key = Self::job_key(&job.id);
        let encoded = serde_json::to_vec(&job)?;

        // Record first, claim second: whoever observes a claimed key can read its owner.
        self.db.insert(job_key.as_bytes(), encoded)?;

        if let Some(key) = &job.idempotency_key {
            let claim = self.db.compare_and_swap(
                Self::idempotency_key(key),
                None as Option<&[u8]>,
                Some(job.id.to_string().as_bytes()),
            )?;
            if let Err(conflict) = claim {
                self.db.remove(job_key.as_bytes())?;
                let owner = conflict
                    .current
                    .ok_or_else(|| StorageError::MissingRecord(format!("idem:{}", key)))?;
                let owner = Self::decode_id(&owner)?;
                debug!(job_id = %job.id, owner = %owner, "idempotency_claim_lost");
                return self
                    .get(&owner)?
                    .map(InsertOutcome::Existing)
                    .ok_or_else(|| StorageError::MissingRecord(owner.to_string()));
            }
        }

        if job.status == JobStatus::Completed {
            self.point_fingerprint(&job)?;
        }
        Ok(InsertOutcome::Inserted(job))
    }

    fn compare_and_swap_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        transition: Transition,
    ) -> Result<SwapOutcome, StorageError> {
        let key = Self::job_key(id);
        loop {
            let current: IVec = self
                .db
                .get(&key)?
                .ok_or_else(|| StorageError::MissingRecord(id.to_string()))?;
            let mut job = Self::decode(&current)?;
            if job.status != expected || !expected.can_transition_to(transition.target()) {
                return Ok(SwapOutcome::Conflict(job));
            }

            job.apply(transition.clone(), Utc::now());
            let updated = serde_json::to_vec(&job)?;
            match self
                .db
                .compare_and_swap(&key, Some(&current), Some(updated))?
            {
                Ok(()) => {
                    // Only a record that actually became `completed` may take over the index.
                    if job.status == JobStatus::Completed {
                        self.point_fingerprint(&job)?;
                    }
                    return Ok(SwapOutcome::Swapped(job));
                }
                // Record changed underneath us; re-read and re-check the expectation.
                Err(_) => continue,
            }
        }
    }

    fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Job>, StorageError> {
        self.lookup_index(Self::idempotency_key(key))
    }

    fn latest_completed(&self, fingerprint: &Fingerprint) -> Result<Option<Job>, StorageError> {
        Ok(self
            .lookup_index(Self::fingerprint_key(fingerprint))?
            .filter(|job| job.status == JobStatus::Completed && job.result.is_some()))
    }
}
