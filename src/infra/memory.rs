//! In-process job substrate used by the `run` command and by tests.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    application::{
        jobs::{DispatchOutcome, PipelineEngine, PipelineError},
        repos::{JobQueryFilter, JobsRepo, NewJobRecord, RepoError, UpdateJobStateParams},
    },
    domain::{
        entities::{JobLogEntry, JobRecord},
        types::{JobState, StageName},
    },
};

/// Whether [`MemoryJobQueue::run_until_idle`] waits out visibility delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPolicy {
    Honour,
    /// Treat every delayed job as visible immediately.
    Skip,
}

/// One activation performed by [`MemoryJobQueue::run_until_idle`].
#[derive(Debug)]
pub struct DispatchReport {
    pub job_id: String,
    pub stage: StageName,
    pub attempt: i32,
    pub result: Result<DispatchOutcome, PipelineError>,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    jobs: BTreeMap<u64, JobRecord>,
}

impl QueueState {
    fn get_mut(&mut self, id: &str) -> Result<&mut JobRecord, RepoError> {
        id.parse::<u64>()
            .ok()
            .and_then(|key| self.jobs.get_mut(&key))
            .ok_or_else(|| RepoError::not_found(id))
    }
}

#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
}

fn claimable(job: &JobRecord, policy: DelayPolicy, now: OffsetDateTime) -> bool {
    let visible = policy == DelayPolicy::Skip || job.visible_at <= now;
    match job.state {
        JobState::Waiting | JobState::Delayed => visible,
        JobState::Failed => job.attempts < job.max_attempts,
        JobState::Active | JobState::Completed => false,
    }
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next visible job, counting the attempt and marking it active.
    pub async fn claim_next(&self, policy: DelayPolicy) -> Option<JobRecord> {
        let now = OffsetDateTime::now_utc();
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .values_mut()
            .filter(|job| claimable(job, policy, now))
            .min_by_key(|job| job.visible_at)?;

        job.attempts += 1;
        job.state = JobState::Active;
        job.finished_at = None;
        Some(job.clone())
    }

    /// Earliest time a pending job becomes visible, if any job is pending.
    pub async fn next_visible_at(&self) -> Option<OffsetDateTime> {
        let state = self.state.lock().await;
        state
            .jobs
            .values()
            .filter(|job| matches!(job.state, JobState::Waiting | JobState::Delayed))
            .map(|job| job.visible_at)
            .min()
    }

    /// Dispatch jobs through `engine` until nothing is left to run.
    ///
    /// Failed jobs are retried while attempts remain. With
    /// [`DelayPolicy::Honour`] the call sleeps until delayed jobs are visible.
    pub async fn run_until_idle(
        &self,
        engine: &PipelineEngine,
        policy: DelayPolicy,
    ) -> Vec<DispatchReport> {
        let mut reports = Vec::new();

        loop {
            let Some(job) = self.claim_next(policy).await else {
                match self.next_visible_at().await {
                    Some(visible_at) if policy == DelayPolicy::Honour => {
                        let wait = visible_at - OffsetDateTime::now_utc();
                        let wait = Duration::try_from(wait).unwrap_or(Duration::ZERO);
                        debug!(
                            target = "tunesmith::infra::memory",
                            wait_secs = wait.as_secs(),
                            "waiting for delayed job"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    _ => break,
                }
            };

            let result = engine.dispatch_record(&job).await;
            if let Err(err) = &result {
                warn!(
                    target = "tunesmith::infra::memory",
                    job_id = %job.id,
                    stage = job.stage.as_str(),
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    error = %err,
                    "job attempt failed"
                );
            }
            reports.push(DispatchReport {
                job_id: job.id,
                stage: job.stage,
                attempt: job.attempts,
                result,
            });
        }

        reports
    }
}

#[async_trait]
impl JobsRepo for MemoryJobQueue {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let key = state.next_id;
        let id = key.to_string();

        state.jobs.insert(
            key,
            JobRecord {
                id: id.clone(),
                stage: job.stage,
                payload: job.payload,
                state: JobState::initial(job.visible_at, OffsetDateTime::now_utc()),
                progress: 0,
                logs: Vec::new(),
                attempts: 0,
                max_attempts: job.max_attempts,
                visible_at: job.visible_at,
                finished_at: None,
                last_error: None,
            },
        );
        Ok(id)
    }

    async fn update_job_state(&self, params: UpdateJobStateParams) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        let job = state.get_mut(&params.id)?;
        job.state = params.state;
        if params.last_error.is_some() {
            job.last_error = params.last_error;
        }
        job.finished_at = params
            .state
            .is_terminal()
            .then(OffsetDateTime::now_utc);
        Ok(())
    }

    async fn record_progress(&self, id: &str, progress: u8) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.get_mut(id)?.progress = progress.min(100);
        Ok(())
    }

    async fn append_log(&self, id: &str, entry: JobLogEntry) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.get_mut(id)?.logs.push(entry);
        Ok(())
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(id
            .parse::<u64>()
            .ok()
            .and_then(|key| state.jobs.get(&key))
            .cloned())
    }

    async fn list_jobs(&self, filter: &JobQueryFilter) -> Result<Vec<JobRecord>, RepoError> {
        let state = self.state.lock().await;
        let limit = filter.effective_limit() as usize;
        Ok(state
            .jobs
            .values()
            .rev()
            .filter(|job| filter.matches(job))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job(stage: StageName, delay: time::Duration) -> NewJobRecord {
        NewJobRecord {
            stage,
            payload: serde_json::json!({}),
            visible_at: OffsetDateTime::now_utc() + delay,
            max_attempts: 2,
        }
    }

    #[tokio::test]
    async fn delayed_jobs_are_hidden_until_visible() {
        let queue = MemoryJobQueue::new();
        let id = queue
            .enqueue_job(new_job(StageName::Render, time::Duration::minutes(10)))
            .await
            .unwrap();

        let job = queue.find_job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Delayed);
        assert!(queue.claim_next(DelayPolicy::Honour).await.is_none());

        let claimed = queue.claim_next(DelayPolicy::Skip).await.unwrap();
        assert_eq!(claimed.id, id);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.state, JobState::Active);
    }

    #[tokio::test]
    async fn failed_jobs_are_reclaimed_until_attempts_run_out() {
        let queue = MemoryJobQueue::new();
        let id = queue
            .enqueue_job(new_job(StageName::Compose, time::Duration::ZERO))
            .await
            .unwrap();

        for attempt in 1..=2 {
            let job = queue.claim_next(DelayPolicy::Honour).await.unwrap();
            assert_eq!(job.attempts, attempt);
            queue
                .update_job_state(UpdateJobStateParams {
                    id: id.clone(),
                    state: JobState::Failed,
                    last_error: Some("boom".into()),
                })
                .await
                .unwrap();
        }

        assert!(queue.claim_next(DelayPolicy::Honour).await.is_none());
        let job = queue.find_job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn list_filters_by_stage_newest_first() {
        let queue = MemoryJobQueue::new();
        let first = queue
            .enqueue_job(new_job(StageName::Compose, time::Duration::ZERO))
            .await
            .unwrap();
        queue
            .enqueue_job(new_job(StageName::Render, time::Duration::ZERO))
            .await
            .unwrap();
        let third = queue
            .enqueue_job(new_job(StageName::Compose, time::Duration::ZERO))
            .await
            .unwrap();

        let filter = JobQueryFilter {
            stage: Some(StageName::Compose),
            ..JobQueryFilter::default()
        };
        let ids: Vec<_> = queue
            .list_jobs(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.id)
            .collect();

        assert_eq!(ids, [third, first]);
    }

    #[tokio::test]
    async fn writes_to_unknown_jobs_are_not_found() {
        let queue = MemoryJobQueue::new();

        let err = queue.record_progress("42", 10).await.unwrap_err();

        assert!(matches!(err, RepoError::NotFound { .. }));
    }
}
