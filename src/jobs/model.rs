//! Job records, the status state machine, and the caller-facing response shapes.

use crate::error::{FailureKind, ProviderFailure};
use crate::types::{Fingerprint, GenerationRequest, GenerationResult, Usage};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque job identifier (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job id as printed by [`fmt::Display`].
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Legal edges: queued → running | cancelled, running → completed | failed | cancelled.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Queued, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure details stored on a failed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub code: String,
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub trace_id: String,
    #[serde(default)]
    pub usage: Usage,
}

impl JobError {
    pub const GENERATION_FAILED: &'static str = "GENERATION_FAILED";

    /// Build the stored error for a classified failure.
    ///
    /// `default_retry_secs` applies to every retryable kind except `RateLimited`, which uses
    /// `rate_limit_retry_secs`.
    pub fn from_failure(
        failure: &ProviderFailure,
        trace_id: &str,
        usage: Usage,
        default_retry_secs: u64,
        rate_limit_retry_secs: u64,
    ) -> Self {
        let retryable = failure.is_retryable();
        let retry_after_secs = match (retryable, failure.kind) {
            (false, _) => None,
            (true, FailureKind::RateLimited) => Some(rate_limit_retry_secs),
            (true, _) => Some(default_retry_secs),
        };
        Self {
            code: Self::GENERATION_FAILED.to_string(),
            kind: failure.kind,
            message: failure.message.clone(),
            retryable,
            retry_after_secs,
            trace_id: trace_id.to_string(),
            usage,
        }
    }
}

/// A requested status change. Carries the payload the target status requires.
#[derive(Debug, Clone)]
pub enum Transition {
    Start,
    Complete(GenerationResult),
    Fail(JobError),
    Cancel,
}

impl Transition {
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Start => JobStatus::Running,
            Transition::Complete(_) => JobStatus::Completed,
            Transition::Fail(_) => JobStatus::Failed,
            Transition::Cancel => JobStatus::Cancelled,
        }
    }
}

mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// One accepted generation request and its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub trace_id: String,
    pub request: GenerationRequest,
    pub request_fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// New job awaiting a worker
    pub fn queued(
        request: GenerationRequest,
        trace_id: impl Into<String>,
        idempotency_key: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JobId::new(),
            trace_id: trace_id.into(),
            request_fingerprint: request.fingerprint(),
            request,
            idempotency_key,
            status: JobStatus::Queued,
            result: None,
            error: None,
            from_cache: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// New job completed at creation from a prior job's result
    pub fn from_cache(
        request: GenerationRequest,
        trace_id: impl Into<String>,
        idempotency_key: Option<String>,
        cached: GenerationResult,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: JobStatus::Completed,
            result: Some(cached.with_cache_hit(true)),
            from_cache: true,
            ..Self::queued(request, trace_id, idempotency_key, now)
        }
    }

    /// Apply a transition the caller has already checked is legal.
    ///
    /// Result and error are set together with the status so a reader never sees one without the
    /// other. `updated_at` never moves backwards.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) {
        self.status = transition.target();
        match transition {
            Transition::Start | Transition::Cancel => {
                self.result = None;
                self.error = None;
            }
            Transition::Complete(result) => {
                self.result = Some(result);
                self.error = None;
            }
            Transition::Fail(error) => {
                self.result = None;
                self.error = Some(error);
            }
        }
        self.updated_at = self.updated_at.max(now);
    }

    pub fn status_response(&self) -> JobStatusResponse {
        JobStatusResponse {
            job_id: self.id,
            status: self.status,
            created_at: format_timestamp(&self.created_at),
            updated_at: format_timestamp(&self.updated_at),
            error: self.error.clone(),
        }
    }

    pub fn result_response(&self, cache_ttl_secs: u64) -> JobResultResponse {
        let cache = (self.status == JobStatus::Completed && self.from_cache).then_some(CacheInfo {
            hit: true,
            ttl_sec: cache_ttl_secs,
        });
        JobResultResponse {
            job_id: self.id,
            status: self.status,
            result: self
                .result
                .clone()
                .map(|result| result.with_cache_hit(self.from_cache)),
            error: self.error.clone(),
            cache,
        }
    }
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub trace_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub hit: bool,
    pub ttl_sec: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub cancelled: bool,
}
