//! Queue-client trait describing the job substrate.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{JobLogEntry, JobRecord};
use crate::domain::types::{JobState, StageName};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("job `{id}` not found")]
    NotFound { id: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub stage: StageName,
    pub payload: serde_json::Value,
    pub visible_at: OffsetDateTime,
    pub max_attempts: i32,
}

#[derive(Debug, Clone)]
pub struct UpdateJobStateParams {
    pub id: String,
    pub state: JobState,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobQueryFilter {
    pub stage: Option<StageName>,
    pub state: Option<JobState>,
    pub limit: Option<u32>,
}

impl JobQueryFilter {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn matches(&self, job: &JobRecord) -> bool {
        self.stage.is_none_or(|stage| stage == job.stage)
            && self.state.is_none_or(|state| state == job.state)
    }
}

/// Durable storage of job state with delayed visibility.
///
/// Attempt counting belongs to the substrate; the pipeline engine only moves
/// jobs between states and records progress and log lines.
#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;

    async fn update_job_state(&self, params: UpdateJobStateParams) -> Result<(), RepoError>;

    async fn record_progress(&self, id: &str, progress: u8) -> Result<(), RepoError>;

    async fn append_log(&self, id: &str, entry: JobLogEntry) -> Result<(), RepoError>;

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError>;

    async fn list_jobs(&self, filter: &JobQueryFilter) -> Result<Vec<JobRecord>, RepoError>;
}
