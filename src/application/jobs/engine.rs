//! Stage dispatch and the transitions between pipeline stages.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::{
    application::repos::{JobsRepo, UpdateJobStateParams},
    domain::{
        entities::{JobLogEntry, JobRecord, PublishResult},
        types::{JobState, StageName},
    },
};

use super::{
    error::{PipelineError, StageError},
    payloads::{ComposeJobPayload, PublishJobPayload, RenderJobPayload, StageRequest},
    queue::enqueue_job,
    reporter::StageReporter,
};

/// The next stage a handler asks the engine to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    pub request: StageRequest,
    pub delay: Duration,
}

impl FollowUp {
    pub fn immediately(request: StageRequest) -> Self {
        Self {
            request,
            delay: Duration::ZERO,
        }
    }

    pub fn after(request: StageRequest, delay: Duration) -> Self {
        Self { request, delay }
    }
}

/// What a handler returns when it did not fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Continue(FollowUp),
    Finished(PublishResult),
    /// The upstream service declined; the pipeline instance ends here.
    Abandoned { reason: String },
}

#[async_trait]
pub trait StageHandler: Send + Sync {
    type Payload: Send + 'static;

    fn stage(&self) -> StageName;

    async fn execute(
        &self,
        payload: Self::Payload,
        reporter: &StageReporter,
    ) -> Result<StageOutcome, StageError>;
}

#[derive(Clone)]
pub struct StageHandlers {
    pub compose: Arc<dyn StageHandler<Payload = ComposeJobPayload>>,
    pub render: Arc<dyn StageHandler<Payload = RenderJobPayload>>,
    pub publish: Arc<dyn StageHandler<Payload = PublishJobPayload>>,
}

/// Result of a dispatch that did not fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Advanced {
        next_job_id: String,
        next_stage: StageName,
        delay: Duration,
    },
    Finished(PublishResult),
    Abandoned {
        reason: String,
    },
}

pub struct PipelineEngine {
    jobs: Arc<dyn JobsRepo>,
    handlers: StageHandlers,
    max_attempts: i32,
}

impl PipelineEngine {
    pub fn new(jobs: Arc<dyn JobsRepo>, handlers: StageHandlers, max_attempts: i32) -> Self {
        Self {
            jobs,
            handlers,
            max_attempts,
        }
    }

    pub fn jobs(&self) -> &Arc<dyn JobsRepo> {
        &self.jobs
    }

    /// Admit a job for `request.stage()`, visible after `delay`.
    pub async fn enqueue(
        &self,
        request: &StageRequest,
        delay: Duration,
    ) -> Result<String, PipelineError> {
        let stage = request.stage();
        let payload = request
            .to_value()
            .map_err(|source| PipelineError::Payload { stage, source })?;
        let id = enqueue_job(self.jobs.as_ref(), stage, payload, delay, self.max_attempts).await?;

        info!(
            target = "tunesmith::application::jobs::engine",
            job_id = %id,
            stage = stage.as_str(),
            profile = request.variant().selection.profile().as_str(),
            delay_secs = delay.as_secs(),
            "job enqueued"
        );
        Ok(id)
    }

    /// Run a stored job, decoding its payload first.
    pub async fn dispatch_record(&self, job: &JobRecord) -> Result<DispatchOutcome, PipelineError> {
        match StageRequest::from_parts(job.stage, job.payload.clone()) {
            Ok(request) => self.dispatch(&job.id, request).await,
            Err(source) => {
                let err = PipelineError::Payload {
                    stage: job.stage,
                    source,
                };
                self.fail(&job.id, job.stage, &err).await?;
                Err(err)
            }
        }
    }

    /// Execute one activation of `job_id` and apply the resulting transition.
    pub async fn dispatch(
        &self,
        job_id: &str,
        request: StageRequest,
    ) -> Result<DispatchOutcome, PipelineError> {
        match request {
            StageRequest::Compose(payload) => {
                self.run(job_id, self.handlers.compose.as_ref(), payload)
                    .await
            }
            StageRequest::Render(payload) => {
                self.run(job_id, self.handlers.render.as_ref(), payload)
                    .await
            }
            StageRequest::Publish(payload) => {
                self.run(job_id, self.handlers.publish.as_ref(), payload)
                    .await
            }
        }
    }

    async fn run<P: Send + 'static>(
        &self,
        job_id: &str,
        handler: &dyn StageHandler<Payload = P>,
        payload: P,
    ) -> Result<DispatchOutcome, PipelineError> {
        let stage = handler.stage();
        let started_at = Instant::now();

        self.set_state(job_id, JobState::Active, None).await?;
        self.jobs.record_progress(job_id, 0).await?;
        info!(
            target = "tunesmith::application::jobs::engine",
            job_id = %job_id,
            stage = stage.as_str(),
            "stage started"
        );

        let reporter = StageReporter::new(self.jobs.clone(), job_id, stage);
        let result = handler.execute(payload, &reporter).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("tunesmith_stage_duration_ms", "stage" => stage.as_str())
            .record(elapsed_ms);

        match result {
            Ok(StageOutcome::Continue(follow_up)) => {
                let next_stage = follow_up.request.stage();
                if stage.next() != Some(next_stage) {
                    return self.broken_chain(job_id, stage, Some(next_stage)).await;
                }

                self.jobs.record_progress(job_id, 100).await?;
                let next_job_id = match self.enqueue(&follow_up.request, follow_up.delay).await {
                    Ok(id) => id,
                    Err(err) => {
                        self.fail(job_id, stage, &err).await?;
                        return Err(err);
                    }
                };
                self.append(
                    job_id,
                    format!("Enqueued {next_stage} job {next_job_id}"),
                )
                .await;
                self.set_state(job_id, JobState::Completed, None).await?;
                metrics::counter!("tunesmith_stage_completed_total", "stage" => stage.as_str())
                    .increment(1);

                Ok(DispatchOutcome::Advanced {
                    next_job_id,
                    next_stage,
                    delay: follow_up.delay,
                })
            }
            Ok(StageOutcome::Finished(result)) => {
                if stage.next().is_some() {
                    return self.broken_chain(job_id, stage, None).await;
                }

                self.jobs.record_progress(job_id, 100).await?;
                self.set_state(job_id, JobState::Completed, None).await?;
                metrics::counter!("tunesmith_stage_completed_total", "stage" => stage.as_str())
                    .increment(1);
                info!(
                    target = "tunesmith::application::jobs::engine",
                    job_id = %job_id,
                    stage = stage.as_str(),
                    video_id = %result.video_id,
                    "pipeline finished"
                );

                Ok(DispatchOutcome::Finished(result))
            }
            Ok(StageOutcome::Abandoned { reason }) => {
                warn!(
                    target = "tunesmith::application::jobs::engine",
                    job_id = %job_id,
                    stage = stage.as_str(),
                    reason = %reason,
                    "pipeline abandoned"
                );
                self.append(job_id, format!("Abandoned: {reason}")).await;
                self.jobs.record_progress(job_id, 0).await?;
                self.set_state(job_id, JobState::Completed, None).await?;
                metrics::counter!("tunesmith_stage_abandoned_total", "stage" => stage.as_str())
                    .increment(1);

                Ok(DispatchOutcome::Abandoned { reason })
            }
            Err(source) => {
                let err = PipelineError::Stage { stage, source };
                self.fail(job_id, stage, &err).await?;
                Err(err)
            }
        }
    }

    async fn broken_chain(
        &self,
        job_id: &str,
        stage: StageName,
        to: Option<StageName>,
    ) -> Result<DispatchOutcome, PipelineError> {
        let err = PipelineError::Chain {
            from: stage,
            to,
            expected: stage.next(),
        };
        self.fail(job_id, stage, &err).await?;
        Err(err)
    }

    async fn fail(
        &self,
        job_id: &str,
        stage: StageName,
        err: &PipelineError,
    ) -> Result<(), PipelineError> {
        error!(
            target = "tunesmith::application::jobs::engine",
            job_id = %job_id,
            stage = stage.as_str(),
            error = %err,
            "stage failed"
        );
        self.append(job_id, format!("Error in {stage} job: {err}"))
            .await;
        self.jobs.record_progress(job_id, 0).await?;
        self.set_state(job_id, JobState::Failed, Some(err.to_string()))
            .await?;
        metrics::counter!("tunesmith_stage_failed_total", "stage" => stage.as_str()).increment(1);
        Ok(())
    }

    async fn set_state(
        &self,
        job_id: &str,
        state: JobState,
        last_error: Option<String>,
    ) -> Result<(), PipelineError> {
        self.jobs
            .update_job_state(UpdateJobStateParams {
                id: job_id.to_string(),
                state,
                last_error,
            })
            .await?;
        Ok(())
    }

    async fn append(&self, job_id: &str, message: String) {
        if let Err(err) = self.jobs.append_log(job_id, JobLogEntry::now(message)).await {
            warn!(
                target = "tunesmith::application::jobs::engine",
                job_id = %job_id,
                error = %err,
                "failed to append job log entry"
            );
        }
    }
}
