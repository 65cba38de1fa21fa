//! YouTube Data API adapter: OAuth refresh, resumable upload and playlist attach.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{
    Body, Client, Url,
    header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::application::clients::{AccessToken, ClientError, VideoHost, VideoUpload};

use super::{as_directory, endpoint, read_json};

const HOST_SERVICE: &str = "video hosting";
const AUTH_SERVICE: &str = "oauth token";
/// Refresh tokens this close to expiry.
const EXPIRY_MARGIN_MS: i64 = 60_000;

#[derive(Debug, Clone)]
pub struct YouTubeSettings {
    pub token_path: PathBuf,
    pub credentials_path: PathBuf,
    pub api_base: Url,
    pub upload_base: Url,
}

/// Token file as written by the Google OAuth client libraries.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    installed: Option<ClientSecrets>,
    #[serde(default)]
    web: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    id: String,
}

fn now_ms() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

impl StoredToken {
    fn usable_access_token(&self, now_ms: i64) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        match self.expiry_date {
            Some(expiry) if expiry - EXPIRY_MARGIN_MS > now_ms => Some(token),
            _ => None,
        }
    }
}

fn refresh_form(secrets: &ClientSecrets, refresh_token: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "refresh_token")
        .append_pair("refresh_token", refresh_token)
        .append_pair("client_id", &secrets.client_id)
        .append_pair("client_secret", &secrets.client_secret)
        .finish()
}

#[derive(Clone)]
pub struct YouTubeClient {
    http: Client,
    settings: YouTubeSettings,
}

impl YouTubeClient {
    pub fn new(http: Client, mut settings: YouTubeSettings) -> Self {
        settings.api_base = as_directory(settings.api_base);
        settings.upload_base = as_directory(settings.upload_base);
        Self { http, settings }
    }

    async fn read_json_file<T: for<'de> Deserialize<'de>>(
        path: &Path,
    ) -> Result<T, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            ClientError::Credentials(format!("failed to read {}: {err}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            ClientError::Credentials(format!("failed to parse {}: {err}", path.display()))
        })
    }

    async fn refresh(&self, stored: StoredToken) -> Result<AccessToken, ClientError> {
        let credentials: CredentialsFile =
            Self::read_json_file(&self.settings.credentials_path).await?;
        let secrets = credentials
            .installed
            .or(credentials.web)
            .ok_or_else(|| ClientError::Credentials("credentials file has no client".into()))?;

        let response = self
            .http
            .post(&secrets.token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(refresh_form(&secrets, &stored.refresh_token))
            .send()
            .await
            .map_err(|err| ClientError::transport(AUTH_SERVICE, err))?;
        let refreshed: RefreshResponse = read_json(AUTH_SERVICE, response).await?;

        let updated = StoredToken {
            access_token: Some(refreshed.access_token.clone()),
            refresh_token: stored.refresh_token,
            scope: refreshed.scope.or(stored.scope),
            token_type: refreshed.token_type.or(stored.token_type),
            expiry_date: refreshed
                .expires_in
                .map(|seconds| now_ms().saturating_add(seconds.saturating_mul(1000))),
        };
        let serialized = serde_json::to_vec_pretty(&updated)
            .map_err(|err| ClientError::Credentials(err.to_string()))?;
        tokio::fs::write(&self.settings.token_path, serialized).await?;

        info!(
            target = "tunesmith::infra::services::youtube",
            "access token refreshed"
        );
        Ok(AccessToken(refreshed.access_token))
    }
}

#[async_trait]
impl VideoHost for YouTubeClient {
    async fn authorize(&self) -> Result<AccessToken, ClientError> {
        let stored: StoredToken = Self::read_json_file(&self.settings.token_path).await?;
        if let Some(token) = stored.usable_access_token(now_ms()) {
            return Ok(AccessToken(token.to_string()));
        }
        self.refresh(stored).await
    }

    async fn upload(
        &self,
        token: &AccessToken,
        upload: &VideoUpload,
    ) -> Result<String, ClientError> {
        let file = tokio::fs::File::open(&upload.path).await?;
        let length = file.metadata().await?.len();

        let mut session_url = endpoint(HOST_SERVICE, &self.settings.upload_base, "videos")?;
        session_url
            .query_pairs_mut()
            .append_pair("uploadType", "resumable")
            .append_pair("part", "snippet,status");
        let metadata = json!({
            "snippet": {
                "title": upload.title,
                "description": upload.description,
                "tags": upload.tags,
                "categoryId": upload.category_id,
            },
            "status": {
                "privacyStatus": upload.privacy_status,
                "embeddable": upload.embeddable,
                "license": upload.license,
            },
        });

        let session = self
            .http
            .post(session_url)
            .bearer_auth(&token.0)
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", length.to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|err| ClientError::transport(HOST_SERVICE, err))?;
        let status = session.status();
        if !status.is_success() {
            let text = session.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: HOST_SERVICE,
                status: status.as_u16(),
                body: text,
            });
        }
        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ClientError::malformed(HOST_SERVICE, "upload session has no location"))?
            .to_string();

        let response = self
            .http
            .put(location)
            .bearer_auth(&token.0)
            .header(CONTENT_TYPE, "video/*")
            .header(CONTENT_LENGTH, length.to_string())
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|err| ClientError::transport(HOST_SERVICE, err))?;
        let video: ResourceId = read_json(HOST_SERVICE, response).await?;

        Ok(video.id)
    }

    async fn attach_to_collection(
        &self,
        token: &AccessToken,
        collection: &str,
        video_id: &str,
    ) -> Result<String, ClientError> {
        let mut url = endpoint(HOST_SERVICE, &self.settings.api_base, "playlistItems")?;
        url.query_pairs_mut().append_pair("part", "snippet");
        let body = json!({
            "snippet": {
                "playlistId": collection,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id,
                },
            },
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&token.0)
            .json(&body)
            .send()
            .await
            .map_err(|err| ClientError::transport(HOST_SERVICE, err))?;
        let item: ResourceId = read_json(HOST_SERVICE, response).await?;

        Ok(item.id)
    }
}
