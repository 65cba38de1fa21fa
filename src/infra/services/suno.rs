use async_trait::async_trait;
use reqwest::{Client, Response, Url};

use crate::application::clients::{
    ClientError, ServiceReply, SongClip, SongRequest, SongService,
};

use super::{as_directory, endpoint, read_json};

const SONG_SERVICE: &str = "song generation";

/// Client for a suno-api compatible song generation service.
#[derive(Clone)]
pub struct SunoClient {
    http: Client,
    base: Url,
}

impl SunoClient {
    pub fn new(http: Client, base: Url) -> Self {
        Self {
            http,
            base: as_directory(base),
        }
    }

    async fn clips(response: Response) -> Result<ServiceReply<Vec<SongClip>>, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Ok(ServiceReply::Declined {
                status: status.as_u16(),
            });
        }
        read_json(SONG_SERVICE, response)
            .await
            .map(ServiceReply::Accepted)
    }
}

#[async_trait]
impl SongService for SunoClient {
    async fn generate(
        &self,
        request: &SongRequest,
    ) -> Result<ServiceReply<Vec<SongClip>>, ClientError> {
        let url = endpoint(SONG_SERVICE, &self.base, "api/custom_generate")?;
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|err| ClientError::transport(SONG_SERVICE, err))?;

        Self::clips(response).await
    }

    async fn fetch(&self, id: &str) -> Result<ServiceReply<Vec<SongClip>>, ClientError> {
        let mut url = endpoint(SONG_SERVICE, &self.base, "api/get")?;
        url.query_pairs_mut().append_pair("ids", id);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| ClientError::transport(SONG_SERVICE, err))?;

        Self::clips(response).await
    }
}
