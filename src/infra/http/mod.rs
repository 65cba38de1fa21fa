//! Control surface: manual trigger, job inspection and health.

mod error;
mod handlers;
mod middleware;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sqlx::Error as SqlxError;

use crate::{
    application::{error::ErrorReport, jobs::PipelineTrigger, repos::JobsRepo},
    infra::db::PostgresRepositories,
};

#[derive(Clone)]
pub struct HttpState {
    pub trigger: Arc<PipelineTrigger>,
    pub jobs: Arc<dyn JobsRepo>,
    /// Checked by `/health` when the Postgres substrate is in use.
    pub database: Option<Arc<PostgresRepositories>>,
}

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/pipelines", post(handlers::start_pipeline))
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/{id}", get(handlers::get_job))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
