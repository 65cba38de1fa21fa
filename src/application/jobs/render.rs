use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use crate::{
    application::{
        clients::{
            CompletionRequest, EncodeRequest, ImageGenerator, ImageRequest, MediaFetcher,
            ServiceReply, SongService, TextGenerator, VideoEncoder,
        },
        workspace::Workspace,
    },
    domain::{
        entities::RenderedMedia,
        types::StageName,
        variant::{CoverArt, Profile},
    },
};

use super::{
    engine::{FollowUp, StageHandler, StageOutcome},
    error::StageError,
    payloads::{PublishJobPayload, RenderJobPayload, StageRequest},
    reporter::StageReporter,
};

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub text_model: String,
    pub image_model: String,
    pub image_size: String,
    /// Directory holding the images of profiles with a static cover.
    pub static_cover_dir: PathBuf,
}

impl RenderSettings {
    /// Profiles whose cover art this deployment can produce. A profile with a
    /// static cover is left out when its file is missing from
    /// `static_cover_dir`.
    pub fn renderable_profiles(&self) -> Vec<Profile> {
        Profile::ALL
            .into_iter()
            .filter(|profile| match profile.static_cover() {
                Some(file_name) => self.static_cover_dir.join(file_name).is_file(),
                None => true,
            })
            .collect()
    }
}

/// Collaborators the render stage drives.
#[derive(Clone)]
pub struct RenderServices {
    pub songs: Arc<dyn SongService>,
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub encoder: Arc<dyn VideoEncoder>,
}

enum CoverSource {
    Remote(String),
    Local(PathBuf),
}

/// Turns a generated song and a still image into an encoded video.
pub struct RenderStage {
    services: RenderServices,
    workspace: Workspace,
    settings: RenderSettings,
}

impl RenderStage {
    pub fn new(services: RenderServices, workspace: Workspace, settings: RenderSettings) -> Self {
        Self {
            services,
            workspace,
            settings,
        }
    }

    /// Resolve the cover image, or `None` when the image service produced nothing.
    async fn cover(
        &self,
        cover: &CoverArt,
        reporter: &StageReporter,
    ) -> Result<Option<CoverSource>, StageError> {
        match cover {
            CoverArt::Generated { prompt } => {
                reporter.log("Generating cover image prompt").await;
                let image_prompt = self
                    .services
                    .text
                    .complete(CompletionRequest {
                        messages: prompt.clone(),
                        model: self.settings.text_model.clone(),
                        temperature: None,
                    })
                    .await?;
                let image_prompt = image_prompt.trim();
                if image_prompt.is_empty() {
                    return Err(StageError::malformed("text service returned an empty image prompt"));
                }

                reporter.log("Generating cover image").await;
                let urls = self
                    .services
                    .images
                    .generate(&ImageRequest {
                        prompt: image_prompt.to_string(),
                        count: 1,
                        size: self.settings.image_size.clone(),
                        model: self.settings.image_model.clone(),
                    })
                    .await?;
                Ok(urls.into_iter().next().map(CoverSource::Remote))
            }
            CoverArt::Static { file_name } => {
                let path = self.settings.static_cover_dir.join(file_name);
                tokio::fs::metadata(&path)
                    .await
                    .map_err(StageError::Workspace)?;
                reporter
                    .log(format!("Using static cover {}", path.display()))
                    .await;
                Ok(Some(CoverSource::Local(path)))
            }
        }
    }
}

#[async_trait]
impl StageHandler for RenderStage {
    type Payload = RenderJobPayload;

    fn stage(&self) -> StageName {
        StageName::Render
    }

    async fn execute(
        &self,
        payload: RenderJobPayload,
        reporter: &StageReporter,
    ) -> Result<StageOutcome, StageError> {
        let RenderJobPayload { composed, variant } = payload;
        let song_id = composed.song_id.clone();

        reporter
            .log(format!("Creating video for song: {song_id}"))
            .await;
        reporter.progress(10).await;

        let clips = match self.services.songs.fetch(&song_id).await? {
            ServiceReply::Accepted(clips) => clips,
            ServiceReply::Declined { status } => {
                return Ok(StageOutcome::Abandoned {
                    reason: format!("song service declined lookup with status {status}"),
                });
            }
        };
        let clip = clips
            .into_iter()
            .find(|clip| clip.id == song_id)
            .ok_or_else(|| StageError::malformed(format!("song `{song_id}` not found")))?;
        let audio_url = clip
            .audio_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| StageError::malformed(format!("song `{song_id}` has no audio yet")))?;
        reporter.progress(20).await;

        let Some(cover) = self.cover(&variant.cover, reporter).await? else {
            return Ok(StageOutcome::Abandoned {
                reason: "image service returned no images".to_string(),
            });
        };
        reporter.progress(40).await;

        reporter.log("Cleaning scratch directories").await;
        let dirs = self
            .workspace
            .prepare(&song_id)
            .await
            .map_err(StageError::Workspace)?;
        let audio_path = dirs.temp.join(format!("{song_id}.mp3"));
        let output_path = dirs.output.join(format!("{song_id}.mp4"));

        reporter.log("Downloading audio").await;
        self.services
            .fetcher
            .download(&audio_url, &audio_path)
            .await?;
        reporter.progress(60).await;

        let (image_path, downloaded_image) = match cover {
            CoverSource::Remote(url) => {
                reporter.log("Downloading cover image").await;
                let path = dirs.temp.join(format!("{song_id}.png"));
                self.services.fetcher.download(&url, &path).await?;
                (path.clone(), Some(path))
            }
            CoverSource::Local(path) => (path, None),
        };
        reporter.progress(70).await;

        reporter.log("Encoding video").await;
        self.services
            .encoder
            .encode(&EncodeRequest {
                image: image_path,
                audio: audio_path.clone(),
                output: output_path.clone(),
            })
            .await?;
        reporter.progress(90).await;

        tokio::fs::remove_file(&audio_path)
            .await
            .map_err(StageError::Workspace)?;
        if let Some(path) = downloaded_image {
            tokio::fs::remove_file(&path)
                .await
                .map_err(StageError::Workspace)?;
        }
        reporter
            .log(format!("Video created: {}", output_path.display()))
            .await;

        let media = RenderedMedia {
            song_id,
            video_path: output_path,
            title: composed.title,
        };

        Ok(StageOutcome::Continue(FollowUp::immediately(
            StageRequest::Publish(PublishJobPayload { media, variant }),
        )))
    }
}
