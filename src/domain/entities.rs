//! Records persisted by the job substrate and the artifacts stages hand to each other.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::types::{JobState, StageName};

/// One timestamped, human-readable line in a job's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLogEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub message: String,
}

impl JobLogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            message: message.into(),
        }
    }
}

/// Snapshot of a job as the substrate currently sees it.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub stage: StageName,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub progress: u8,
    pub logs: Vec<JobLogEntry>,
    pub attempts: i32,
    pub max_attempts: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub visible_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

/// Output of the compose stage: the song the generation service accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedText {
    pub song_id: String,
    pub title: String,
    pub tags: String,
}

/// Output of the render stage: an encoded video waiting to be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMedia {
    pub song_id: String,
    pub video_path: PathBuf,
    pub title: String,
}

/// Terminal output of the publish stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub video_id: String,
    pub collection_item_id: Option<String>,
}
