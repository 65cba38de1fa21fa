use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::application::clients::{
    ClientError, CompletionRequest, ImageGenerator, ImageRequest, TextGenerator,
};

use super::{as_directory, endpoint, read_json};

const TEXT_SERVICE: &str = "text generation";
const IMAGE_SERVICE: &str = "image generation";

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<ChatBodyMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatBodyMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    #[serde(default)]
    url: Option<String>,
}

/// Client for an OpenAI-compatible chat completion and image API.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base: Url,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(http: Client, base: Url, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base: as_directory(base),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ClientError> {
        let url = endpoint(TEXT_SERVICE, &self.base, "chat/completions")?;
        let body = ChatBody {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|message| ChatBodyMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::transport(TEXT_SERVICE, err))?;
        let parsed: ChatResponse = read_json(TEXT_SERVICE, response).await?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ClientError::malformed(TEXT_SERVICE, "completion has no content"))
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ClientError> {
        let url = endpoint(IMAGE_SERVICE, &self.base, "images/generations")?;
        let body = ImageBody {
            model: &request.model,
            prompt: &request.prompt,
            n: request.count,
            size: &request.size,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::transport(IMAGE_SERVICE, err))?;
        let parsed: ImageResponse = read_json(IMAGE_SERVICE, response).await?;

        Ok(parsed.data.into_iter().filter_map(|datum| datum.url).collect())
    }
}
