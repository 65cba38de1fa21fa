//! HTTP adapters for the generative, song and hosting services.

mod download;
mod openai;
mod suno;
mod youtube;

pub use download::HttpMediaFetcher;
pub use openai::OpenAiClient;
pub use suno::SunoClient;
pub use youtube::{YouTubeClient, YouTubeSettings};

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;

use crate::application::clients::ClientError;

pub fn http_client() -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(user_agent()).build()
}

pub fn user_agent() -> &'static str {
    concat!("tunesmith/", env!("CARGO_PKG_VERSION"))
}

/// Give `url` a trailing slash so `join` keeps its last path segment.
pub fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

pub(crate) fn endpoint(service: &'static str, base: &Url, path: &str) -> Result<Url, ClientError> {
    base.join(path)
        .map_err(|err| ClientError::malformed(service, format!("invalid endpoint `{path}`: {err}")))
}

/// Read a JSON body, turning non-success statuses into [`ClientError::Status`].
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: Response,
) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ClientError::transport(service, err))?;
    if !status.is_success() {
        return Err(ClientError::Status {
            service,
            status: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }
    serde_json::from_slice(&bytes).map_err(|err| ClientError::malformed(service, err.to_string()))
}
