use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::seq::IndexedRandom;

use crate::{
    application::clients::{
        CompletionRequest, ServiceReply, SongClip, SongRequest, SongService, TextGenerator,
    },
    domain::{
        entities::ComposedText,
        sanitize::{TAG_BUDGET, sanitize_tags, sanitize_title},
        types::StageName,
        variant::ChatMessage,
    },
};

use super::{
    engine::{FollowUp, StageHandler, StageOutcome},
    error::StageError,
    payloads::{ComposeJobPayload, RenderJobPayload, StageRequest},
    reporter::StageReporter,
};

#[derive(Debug, Clone)]
pub struct ComposeSettings {
    pub text_model: String,
    pub song_model: String,
    pub tag_budget: usize,
    /// Visibility delay applied to the render job.
    pub render_delay: Duration,
}

impl ComposeSettings {
    pub fn new(text_model: impl Into<String>, song_model: impl Into<String>) -> Self {
        Self {
            text_model: text_model.into(),
            song_model: song_model.into(),
            tag_budget: TAG_BUDGET,
            render_delay: Duration::from_secs(600),
        }
    }
}

/// Writes the song structure, title and tags, then submits them for generation.
pub struct ComposeStage {
    text: Arc<dyn TextGenerator>,
    songs: Arc<dyn SongService>,
    settings: ComposeSettings,
}

impl ComposeStage {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        songs: Arc<dyn SongService>,
        settings: ComposeSettings,
    ) -> Self {
        Self {
            text,
            songs,
            settings,
        }
    }

    fn completion(&self, messages: &[ChatMessage]) -> CompletionRequest {
        CompletionRequest {
            messages: messages.to_vec(),
            model: self.settings.text_model.clone(),
            temperature: None,
        }
    }
}

fn pick_clip(clips: &[SongClip]) -> Option<SongClip> {
    clips.choose(&mut rand::rng()).cloned()
}

#[async_trait]
impl StageHandler for ComposeStage {
    type Payload = ComposeJobPayload;

    fn stage(&self) -> StageName {
        StageName::Compose
    }

    async fn execute(
        &self,
        payload: ComposeJobPayload,
        reporter: &StageReporter,
    ) -> Result<StageOutcome, StageError> {
        let ComposeJobPayload { variant } = payload;

        reporter
            .log(format!(
                "Composing {} song",
                variant.selection.profile().as_str()
            ))
            .await;
        reporter.progress(10).await;

        let structure = self
            .text
            .complete(self.completion(&variant.prompts.structure))
            .await?;
        if structure.trim().is_empty() {
            return Err(StageError::malformed("text service returned an empty structure"));
        }
        reporter.progress(30).await;

        let (raw_title, raw_tags) = tokio::try_join!(
            self.text.complete(self.completion(&variant.prompts.title)),
            self.text.complete(self.completion(&variant.prompts.tags)),
        )?;
        let title = sanitize_title(&raw_title);
        if title.is_empty() {
            return Err(StageError::malformed(format!(
                "generated title `{}` is empty once sanitized",
                raw_title.trim()
            )));
        }
        let tags = sanitize_tags(&raw_tags, self.settings.tag_budget);
        reporter.progress(50).await;

        let request = SongRequest {
            prompt: structure,
            tags,
            title,
            make_instrumental: false,
            model: self.settings.song_model.clone(),
            wait_audio: false,
        };
        reporter
            .log(format!(
                "Submitting song \"{}\" with tags \"{}\"",
                request.title, request.tags
            ))
            .await;

        let clips = match self.songs.generate(&request).await? {
            ServiceReply::Accepted(clips) => clips,
            ServiceReply::Declined { status } => {
                return Ok(StageOutcome::Abandoned {
                    reason: format!("song service declined generation with status {status}"),
                });
            }
        };
        let clip =
            pick_clip(&clips).ok_or_else(|| StageError::malformed("song service returned no clips"))?;
        reporter.progress(80).await;
        reporter.log(format!("Song created: {}", clip.id)).await;

        let composed = ComposedText {
            song_id: clip.id,
            title: request.title,
            tags: request.tags,
        };

        Ok(StageOutcome::Continue(FollowUp::after(
            StageRequest::Render(RenderJobPayload { composed, variant }),
            self.settings.render_delay,
        )))
    }
}
