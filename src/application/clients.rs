//! Boundaries to the external services the stages drive.
//!
//! Each trait is implemented by an adapter under `infra` and by in-memory
//! stubs in tests.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::variant::ChatMessage;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {service} failed with status {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("transport error talking to {service}: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },
    #[error("malformed response from {service}: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
    #[error("credential error: {0}")]
    Credentials(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    pub fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            message: message.into(),
        }
    }
}

/// Result of a call where the service may explicitly decline the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceReply<T> {
    Accepted(T),
    Declined { status: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: Option<f32>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongRequest {
    pub prompt: String,
    pub tags: String,
    pub title: String,
    pub make_instrumental: bool,
    pub model: String,
    pub wait_audio: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SongClip {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait SongService: Send + Sync {
    async fn generate(&self, request: &SongRequest)
    -> Result<ServiceReply<Vec<SongClip>>, ClientError>;

    async fn fetch(&self, id: &str) -> Result<ServiceReply<Vec<SongClip>>, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub count: u8,
    pub size: String,
    pub model: String,
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Returns the URLs of the generated images.
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ClientError>;
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Stream `url` into `destination`, returning the number of bytes written.
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeRequest {
    pub image: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("video encoder unavailable: {0}")]
    NotFound(io::Error),
    #[error("failed to run video encoder: {0}")]
    Io(io::Error),
    #[error("video encoder failed (exit {exit_code:?}): {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Loop the still image over the audio track and write the video to
    /// `request.output`. Resolves once the encoder has exited.
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncodeError>;
}

/// Short-lived credential for the hosting service.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUpload {
    pub path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: String,
    pub license: String,
    pub embeddable: bool,
}

#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Load stored credentials, refreshing them if they have expired.
    async fn authorize(&self) -> Result<AccessToken, ClientError>;

    /// Upload the video and return the hosting service's id for it.
    async fn upload(&self, token: &AccessToken, upload: &VideoUpload)
    -> Result<String, ClientError>;

    /// Add an uploaded video to a collection, returning the collection item id.
    async fn attach_to_collection(
        &self,
        token: &AccessToken,
        collection: &str,
        video_id: &str,
    ) -> Result<String, ClientError>;
}
