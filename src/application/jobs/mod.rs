mod compose;
mod context;
mod engine;
mod error;
mod payloads;
mod publish;
mod queue;
mod render;
mod reporter;
mod trigger;
mod workers;

pub use compose::{ComposeSettings, ComposeStage};
pub use context::{JobWorkerContext, TriggerContext, job_failed};
pub use engine::{
    DispatchOutcome, FollowUp, PipelineEngine, StageHandler, StageHandlers, StageOutcome,
};
pub use error::{FaultKind, PipelineError, StageError};
pub use payloads::{ComposeJobPayload, PublishJobPayload, RenderJobPayload, StageRequest};
pub use publish::{PublishSettings, PublishStage};
pub use queue::enqueue_job;
pub use render::{RenderServices, RenderSettings, RenderStage};
pub use reporter::StageReporter;
pub use trigger::{
    PipelineTick, PipelineTrigger, TriggerDefaults, TriggerError, TriggerRequest,
    TriggeredPipeline, plan_variant, process_pipeline_tick,
};
pub use workers::{process_compose_job, process_publish_job, process_render_job};
