use std::{collections::HashMap, convert::TryFrom};

use async_trait::async_trait;
use sqlx::{QueryBuilder, postgres::Postgres};
use time::OffsetDateTime;

use crate::{
    application::repos::{JobQueryFilter, JobsRepo, NewJobRecord, RepoError, UpdateJobStateParams},
    domain::{
        entities::{JobLogEntry, JobRecord},
        types::{JobState, StageName},
    },
};

use super::{PostgresRepositories, map_sqlx_error};

const JOB_COLUMNS: &str = "SELECT j.id,
        j.job_type,
        j.job,
        j.status,
        j.attempts,
        j.max_attempts,
        j.run_at,
        j.last_error,
        j.done_at,
        COALESCE(p.progress, 0::smallint) AS progress
   FROM apalis.jobs j
   LEFT JOIN pipeline_job_progress p ON p.job_id = j.id";

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    job_type: String,
    job: serde_json::Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    run_at: OffsetDateTime,
    last_error: Option<String>,
    done_at: Option<OffsetDateTime>,
    progress: i16,
}

#[derive(sqlx::FromRow)]
struct LogRow {
    job_id: String,
    logged_at: OffsetDateTime,
    message: String,
}

impl JobRow {
    fn into_record(self, logs: Vec<JobLogEntry>, now: OffsetDateTime) -> Result<JobRecord, RepoError> {
        let stage = StageName::try_from(self.job_type.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown job type `{}`", self.job_type))
        })?;
        let state = JobState::from_apalis(&self.status, self.run_at, now).ok_or_else(|| {
            RepoError::from_persistence(format!("unknown job status `{}`", self.status))
        })?;

        Ok(JobRecord {
            id: self.id,
            stage,
            payload: self.job,
            state,
            progress: u8::try_from(self.progress.clamp(0, 100)).unwrap_or(0),
            logs,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            visible_at: self.run_at,
            finished_at: self.done_at,
            last_error: self.last_error,
        })
    }
}

impl PostgresRepositories {
    async fn logs_for(&self, ids: &[String]) -> Result<HashMap<String, Vec<JobLogEntry>>, RepoError> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT job_id, logged_at, message
               FROM pipeline_job_logs
              WHERE job_id = ANY($1)
              ORDER BY id",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut logs: HashMap<String, Vec<JobLogEntry>> = HashMap::new();
        for row in rows {
            logs.entry(row.job_id).or_default().push(JobLogEntry {
                at: row.logged_at,
                message: row.message,
            });
        }
        Ok(logs)
    }
}

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id",
        )
        .bind(job.stage.as_str())
        .bind(&job.payload)
        .bind(JobState::Waiting.apalis_status())
        .bind(job.visible_at)
        .bind(job.max_attempts)
        .bind(0_i32)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn update_job_state(&self, params: UpdateJobStateParams) -> Result<(), RepoError> {
        let UpdateJobStateParams {
            id,
            state,
            last_error,
        } = params;

        let result = sqlx::query(
            "UPDATE apalis.jobs
                SET status = $2,
                    last_error = COALESCE($3, last_error),
                    done_at = CASE WHEN $4 THEN COALESCE(done_at, now()) ELSE NULL END
              WHERE id = $1",
        )
        .bind(&id)
        .bind(state.apalis_status())
        .bind(last_error.as_deref())
        .bind(state.is_terminal())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::not_found(id));
        }
        Ok(())
    }

    async fn record_progress(&self, id: &str, progress: u8) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO pipeline_job_progress (job_id, progress, updated_at)
             VALUES ($1, $2, now())
             ON CONFLICT (job_id)
             DO UPDATE SET progress = EXCLUDED.progress, updated_at = EXCLUDED.updated_at",
        )
        .bind(id)
        .bind(i16::from(progress.min(100)))
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn append_log(&self, id: &str, entry: JobLogEntry) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO pipeline_job_logs (job_id, logged_at, message)
             VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(entry.at)
        .bind(entry.message)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_job(&self, id: &str) -> Result<Option<JobRecord>, RepoError> {
        let row = sqlx::query_as::<_, JobRow>(&format!("{JOB_COLUMNS} WHERE j.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut logs = self.logs_for(std::slice::from_ref(&row.id)).await?;
        let entries = logs.remove(&row.id).unwrap_or_default();
        row.into_record(entries, OffsetDateTime::now_utc()).map(Some)
    }

    async fn list_jobs(&self, filter: &JobQueryFilter) -> Result<Vec<JobRecord>, RepoError> {
        let stages: Vec<&str> = match filter.stage {
            Some(stage) => vec![stage.as_str()],
            None => StageName::ALL.iter().map(|stage| stage.as_str()).collect(),
        };

        let mut qb = QueryBuilder::<Postgres>::new(JOB_COLUMNS);
        qb.push(" WHERE j.job_type = ANY(");
        qb.push_bind(stages);
        qb.push(")");

        if let Some(state) = filter.state {
            qb.push(" AND j.status = ");
            qb.push_bind(state.apalis_status());
        }

        qb.push(" ORDER BY j.run_at DESC, j.id DESC LIMIT ");
        qb.push_bind(i64::from(filter.effective_limit()));

        let rows = qb
            .build_query_as::<JobRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let mut logs = self.logs_for(&ids).await?;
        let now = OffsetDateTime::now_utc();

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let entries = logs.remove(&row.id).unwrap_or_default();
            let record = row.into_record(entries, now)?;
            // Waiting and Delayed share one apalis status.
            if filter.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }
}
