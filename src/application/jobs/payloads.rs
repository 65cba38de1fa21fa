use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    entities::{ComposedText, RenderedMedia},
    types::StageName,
    variant::VariantConfig,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeJobPayload {
    pub variant: VariantConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJobPayload {
    pub composed: ComposedText,
    pub variant: VariantConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishJobPayload {
    pub media: RenderedMedia,
    pub variant: VariantConfig,
}

/// A stage name paired with the payload that stage consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageRequest {
    Compose(ComposeJobPayload),
    Render(RenderJobPayload),
    Publish(PublishJobPayload),
}

impl StageRequest {
    pub fn stage(&self) -> StageName {
        match self {
            StageRequest::Compose(_) => StageName::Compose,
            StageRequest::Render(_) => StageName::Render,
            StageRequest::Publish(_) => StageName::Publish,
        }
    }

    pub fn variant(&self) -> &VariantConfig {
        match self {
            StageRequest::Compose(payload) => &payload.variant,
            StageRequest::Render(payload) => &payload.variant,
            StageRequest::Publish(payload) => &payload.variant,
        }
    }

    /// Serialize the payload the way it is stored by the job substrate.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            StageRequest::Compose(payload) => serde_json::to_value(payload),
            StageRequest::Render(payload) => serde_json::to_value(payload),
            StageRequest::Publish(payload) => serde_json::to_value(payload),
        }
    }

    pub fn from_parts(stage: StageName, payload: Value) -> Result<Self, serde_json::Error> {
        Ok(match stage {
            StageName::Compose => StageRequest::Compose(serde_json::from_value(payload)?),
            StageName::Render => StageRequest::Render(serde_json::from_value(payload)?),
            StageName::Publish => StageRequest::Publish(serde_json::from_value(payload)?),
        })
    }
}
