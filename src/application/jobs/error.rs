use std::io;

use thiserror::Error;

use crate::{
    application::{
        clients::{ClientError, EncodeError},
        repos::RepoError,
    },
    domain::types::StageName,
};

/// How the substrate should treat a stage fault. Both kinds are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Network, timeout or malformed upstream response.
    Transient,
    /// Filesystem or workspace failure.
    Resource,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Transient => "transient",
            FaultKind::Resource => "resource",
        }
    }
}

/// An unexpected failure raised by a stage handler.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("workspace error: {0}")]
    Workspace(#[source] io::Error),
    #[error("malformed upstream data: {0}")]
    Malformed(String),
}

impl StageError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            StageError::Client(ClientError::Io(_)) => FaultKind::Resource,
            StageError::Client(_) => FaultKind::Transient,
            StageError::Encode(EncodeError::Failed { .. }) => FaultKind::Transient,
            StageError::Encode(_) => FaultKind::Resource,
            StageError::Workspace(_) => FaultKind::Resource,
            StageError::Malformed(_) => FaultKind::Transient,
        }
    }
}

/// Failure of a whole dispatch, reported back to the substrate.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed ({}): {source}", .source.kind().as_str())]
    Stage {
        stage: StageName,
        #[source]
        source: StageError,
    },
    #[error("invalid payload for {stage} job: {source}")]
    Payload {
        stage: StageName,
        #[source]
        source: serde_json::Error,
    },
    #[error("{from} stage handed off to {to:?}, expected {expected:?}")]
    Chain {
        from: StageName,
        to: Option<StageName>,
        expected: Option<StageName>,
    },
    #[error(transparent)]
    Repo(#[from] RepoError),
}
