use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use tracing::{info, warn};

use crate::{
    application::repos::JobsRepo, domain::entities::JobLogEntry, domain::types::StageName,
};

/// Write-only progress and log channel handed to a stage handler.
///
/// Progress only moves forward within one execution. Substrate write failures
/// are logged and otherwise ignored so reporting never fails a stage.
pub struct StageReporter {
    jobs: Arc<dyn JobsRepo>,
    job_id: String,
    stage: StageName,
    progress: AtomicU8,
}

impl StageReporter {
    pub(crate) fn new(jobs: Arc<dyn JobsRepo>, job_id: impl Into<String>, stage: StageName) -> Self {
        Self {
            jobs,
            job_id: job_id.into(),
            stage,
            progress: AtomicU8::new(0),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn stage(&self) -> StageName {
        self.stage
    }

    pub fn current_progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    /// Raise progress to `value` (capped at 100). Lower values are ignored.
    pub async fn progress(&self, value: u8) {
        let value = value.min(100);
        let previous = self.progress.fetch_max(value, Ordering::AcqRel);
        if value <= previous {
            return;
        }

        if let Err(err) = self.jobs.record_progress(&self.job_id, value).await {
            warn!(
                target = "tunesmith::application::jobs::reporter",
                job_id = %self.job_id,
                stage = self.stage.as_str(),
                progress = value,
                error = %err,
                "failed to record job progress"
            );
        }
    }

    pub async fn log(&self, message: impl Into<String>) {
        let entry = JobLogEntry::now(message);
        info!(
            target = "tunesmith::application::jobs::reporter",
            job_id = %self.job_id,
            stage = self.stage.as_str(),
            "{}",
            entry.message
        );

        if let Err(err) = self.jobs.append_log(&self.job_id, entry).await {
            warn!(
                target = "tunesmith::application::jobs::reporter",
                job_id = %self.job_id,
                stage = self.stage.as_str(),
                error = %err,
                "failed to append job log entry"
            );
        }
    }
}
