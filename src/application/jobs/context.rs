use std::sync::Arc;

use apalis::prelude::Error as ApalisError;

use super::{engine::PipelineEngine, trigger::PipelineTrigger};

/// Shared context passed to the stage workers.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub engine: Arc<PipelineEngine>,
}

/// Shared context passed to the cron trigger worker.
#[derive(Clone)]
pub struct TriggerContext {
    pub trigger: Arc<PipelineTrigger>,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}
