use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::debug;

use crate::application::clients::{ClientError, MediaFetcher};

const DOWNLOAD_SERVICE: &str = "media download";

/// Streams remote media to local files.
#[derive(Clone)]
pub struct HttpMediaFetcher {
    http: Client,
}

impl HttpMediaFetcher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, ClientError> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| ClientError::transport(DOWNLOAD_SERVICE, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                service: DOWNLOAD_SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        let mut file = File::create(destination).await?;
        let mut written = 0_u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| ClientError::transport(DOWNLOAD_SERVICE, err))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(
            target = "tunesmith::infra::services::download",
            url = url,
            path = %destination.display(),
            bytes = written,
            "media downloaded"
        );
        Ok(written)
    }
}
