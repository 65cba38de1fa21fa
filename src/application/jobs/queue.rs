use std::time::Duration;

use time::OffsetDateTime;

use crate::{
    application::repos::{JobsRepo, NewJobRecord, RepoError},
    domain::types::StageName,
};

/// Enqueue a job visible after `delay`, returning the id the substrate assigned.
pub async fn enqueue_job<J>(
    repo: &J,
    stage: StageName,
    payload: serde_json::Value,
    delay: Duration,
    max_attempts: i32,
) -> Result<String, RepoError>
where
    J: JobsRepo + ?Sized,
{
    let delay = time::Duration::try_from(delay).map_err(|err| RepoError::InvalidInput {
        message: format!("delay out of range: {err}"),
    })?;
    let record = NewJobRecord {
        stage,
        payload,
        visible_at: OffsetDateTime::now_utc() + delay,
        max_attempts,
    };

    repo.enqueue_job(record).await
}
