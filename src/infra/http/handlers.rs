use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{jobs::TriggerRequest, repos::JobQueryFilter};

use super::{HttpState, error::ApiError};

pub(super) async fn health(State(state): State<HttpState>) -> Response {
    let Some(database) = state.database.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    super::db_health_response(database.health_check().await)
}

/// Start a pipeline instance. An empty body picks profile and styles at random.
pub(super) async fn start_pipeline(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        TriggerRequest::default()
    } else {
        serde_json::from_slice::<TriggerRequest>(&body)
            .map_err(|err| ApiError::bad_request("Invalid pipeline request", Some(err.to_string())))?
    };

    let started = state.trigger.fire(request).await?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

pub(super) async fn list_jobs(
    State(state): State<HttpState>,
    Query(filter): Query<JobQueryFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = state.jobs.list_jobs(&filter).await?;
    Ok(Json(jobs))
}

pub(super) async fn get_job(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .jobs
        .find_job(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(Json(job))
}
