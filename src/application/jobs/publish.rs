use std::{io::ErrorKind, sync::Arc};

use async_trait::async_trait;

use crate::{
    application::{
        clients::{VideoHost, VideoUpload},
        workspace::Workspace,
    },
    domain::{entities::PublishResult, types::StageName},
};

use super::{
    engine::{StageHandler, StageOutcome},
    error::StageError,
    payloads::PublishJobPayload,
    reporter::StageReporter,
};

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub category_id: String,
    pub privacy_status: String,
    pub license: String,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            category_id: "10".to_string(),
            privacy_status: "private".to_string(),
            license: "youtube".to_string(),
        }
    }
}

/// Uploads the rendered video and removes the local copy.
///
/// Once the upload succeeds, later failures are logged and never fail the job.
pub struct PublishStage {
    host: Arc<dyn VideoHost>,
    workspace: Workspace,
    settings: PublishSettings,
}

impl PublishStage {
    pub fn new(host: Arc<dyn VideoHost>, workspace: Workspace, settings: PublishSettings) -> Self {
        Self {
            host,
            workspace,
            settings,
        }
    }
}

#[async_trait]
impl StageHandler for PublishStage {
    type Payload = PublishJobPayload;

    fn stage(&self) -> StageName {
        StageName::Publish
    }

    async fn execute(
        &self,
        payload: PublishJobPayload,
        reporter: &StageReporter,
    ) -> Result<StageOutcome, StageError> {
        let PublishJobPayload { media, variant } = payload;

        reporter
            .log(format!("Uploading video: {}", media.video_path.display()))
            .await;
        reporter.progress(10).await;

        let token = self.host.authorize().await?;
        reporter.progress(30).await;

        let upload = VideoUpload {
            path: media.video_path.clone(),
            title: variant.title.apply(&media.title),
            description: variant.publish.description.clone(),
            tags: variant.publish.tags.clone(),
            category_id: self.settings.category_id.clone(),
            privacy_status: self.settings.privacy_status.clone(),
            license: self.settings.license.clone(),
            embeddable: true,
        };
        let video_id = self.host.upload(&token, &upload).await?;
        reporter
            .log(format!("Uploaded \"{}\" as {video_id}", upload.title))
            .await;
        reporter.progress(80).await;

        let collection_item_id = match variant.publish.collection.as_deref() {
            Some(collection) => match self
                .host
                .attach_to_collection(&token, collection, &video_id)
                .await
            {
                Ok(item) => {
                    reporter
                        .log(format!("Added {video_id} to collection {collection}"))
                        .await;
                    Some(item)
                }
                Err(err) => {
                    reporter
                        .log(format!(
                            "Could not add {video_id} to collection {collection}: {err}"
                        ))
                        .await;
                    None
                }
            },
            None => None,
        };
        reporter.progress(90).await;

        match tokio::fs::remove_file(&media.video_path).await {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                reporter
                    .log(format!(
                        "Could not delete {}: {err}",
                        media.video_path.display()
                    ))
                    .await;
            }
            _ => {
                reporter
                    .log(format!(
                        "Video uploaded and file deleted: {}",
                        media.video_path.display()
                    ))
                    .await;
            }
        }
        if let Err(err) = self.workspace.release(&media.song_id).await {
            reporter
                .log(format!("Could not release scratch space for {}: {err}", media.song_id))
                .await;
        }

        Ok(StageOutcome::Finished(PublishResult {
            video_id,
            collection_item_id,
        }))
    }
}
