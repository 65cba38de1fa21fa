//! Postgres-backed job substrate.
//!
//! Jobs themselves live in the `apalis.jobs` table so the apalis workers can
//! claim them. Progress and log lines are kept in side tables keyed by job id.

mod jobs;

use std::sync::Arc;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::RepoError;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS pipeline_job_progress (
        job_id TEXT PRIMARY KEY,
        progress SMALLINT NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS pipeline_job_logs (
        id BIGSERIAL PRIMARY KEY,
        job_id TEXT NOT NULL,
        logged_at TIMESTAMPTZ NOT NULL,
        message TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS pipeline_job_logs_job_id_idx
        ON pipeline_job_logs (job_id, id)",
];

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    /// Create the progress and log tables. Safe to run on every start, after
    /// the apalis storage has installed its own schema.
    pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            query(*statement).execute(pool).await?;
        }
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        sqlx::Error::Database(db)
            if db.message().contains("invalid input syntax") || db.message().contains("violates") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        other => RepoError::from_persistence(other),
    }
}
