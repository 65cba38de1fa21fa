//! apalis entry points for the three stage queues.

use apalis::prelude::{Data, Error as ApalisError, TaskId};
use tracing::info;

use super::{
    context::{JobWorkerContext, job_failed},
    engine::DispatchOutcome,
    payloads::{ComposeJobPayload, PublishJobPayload, RenderJobPayload, StageRequest},
};

pub async fn process_compose_job(
    payload: ComposeJobPayload,
    task_id: TaskId,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    run_stage(&context, &task_id, StageRequest::Compose(payload)).await
}

pub async fn process_render_job(
    payload: RenderJobPayload,
    task_id: TaskId,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    run_stage(&context, &task_id, StageRequest::Render(payload)).await
}

pub async fn process_publish_job(
    payload: PublishJobPayload,
    task_id: TaskId,
    context: Data<JobWorkerContext>,
) -> Result<(), ApalisError> {
    run_stage(&context, &task_id, StageRequest::Publish(payload)).await
}

async fn run_stage(
    context: &JobWorkerContext,
    task_id: &TaskId,
    request: StageRequest,
) -> Result<(), ApalisError> {
    let job_id = task_id.to_string();
    let stage = request.stage();
    let outcome = context
        .engine
        .dispatch(&job_id, request)
        .await
        .map_err(job_failed)?;

    let summary = match &outcome {
        DispatchOutcome::Advanced { next_stage, .. } => next_stage.as_str(),
        DispatchOutcome::Finished(_) => "finished",
        DispatchOutcome::Abandoned { .. } => "abandoned",
    };
    info!(
        target = "tunesmith::application::jobs::workers",
        job_id = %job_id,
        stage = stage.as_str(),
        outcome = summary,
        "stage job processed"
    );
    Ok(())
}
