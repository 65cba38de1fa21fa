use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use tunesmith::application::clients::{
    AccessToken, ClientError, CompletionRequest, EncodeError, EncodeRequest, ImageGenerator,
    ImageRequest, MediaFetcher, ServiceReply, SongClip, SongRequest, SongService, TextGenerator,
    VideoEncoder, VideoHost, VideoUpload,
};
use tunesmith::application::jobs::{
    ComposeSettings, ComposeStage, DispatchOutcome, PipelineEngine, PipelineError,
    PipelineTrigger, PublishSettings, PublishStage, RenderServices, RenderSettings, RenderStage,
    StageHandlers, TriggerDefaults, TriggerRequest,
};
use tunesmith::application::repos::{JobQueryFilter, JobsRepo};
use tunesmith::application::workspace::Workspace;
use tunesmith::domain::entities::JobRecord;
use tunesmith::domain::types::{JobState, StageName};
use tunesmith::domain::variant::{CoverArt, Profile, StylePair, VariantSelection, resolve};
use tunesmith::infra::memory::{DelayPolicy, MemoryJobQueue};

const SONG_ID: &str = "song-1";

/// Answers by the kind of request in the final user message.
struct StubText;

#[async_trait]
impl TextGenerator for StubText {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ClientError> {
        let ask = request
            .messages
            .last()
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let reply = if ask.starts_with("Generate an image prompt") {
            "a rainy window at night, anime style"
        } else if ask.starts_with("Generate a title") {
            "Midnight Rain!"
        } else if ask.starts_with("Generate tags") {
            "lofi, chill , beats, study"
        } else {
            "[Intro] soft keys [Verse] dusty drums"
        };
        Ok(reply.to_string())
    }
}

#[derive(Default)]
struct StubSongs {
    decline_generate: bool,
    failing_fetches: AtomicUsize,
    generated: StdMutex<Vec<SongRequest>>,
}

fn clip(id: &str) -> SongClip {
    SongClip {
        id: id.to_string(),
        title: "Midnight Rain".to_string(),
        audio_url: Some(format!("https://songs.test/{id}.mp3")),
        image_url: None,
        status: "complete".to_string(),
    }
}

#[async_trait]
impl SongService for StubSongs {
    async fn generate(
        &self,
        request: &SongRequest,
    ) -> Result<ServiceReply<Vec<SongClip>>, ClientError> {
        self.generated.lock().unwrap().push(request.clone());
        if self.decline_generate {
            return Ok(ServiceReply::Declined { status: 402 });
        }
        Ok(ServiceReply::Accepted(vec![clip(SONG_ID)]))
    }

    async fn fetch(&self, id: &str) -> Result<ServiceReply<Vec<SongClip>>, ClientError> {
        let remaining = self.failing_fetches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_fetches.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::transport("song service", "connection reset"));
        }
        Ok(ServiceReply::Accepted(vec![clip("other-song"), clip(id)]))
    }
}

#[derive(Default)]
struct StubImages {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageGenerator for StubImages {
    async fn generate(&self, request: &ImageRequest) -> Result<Vec<String>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.count, 1);
        Ok(vec!["https://images.test/cover.png".to_string()])
    }
}

#[derive(Default)]
struct StubFetcher {
    downloads: StdMutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn download(&self, url: &str, destination: &Path) -> Result<u64, ClientError> {
        tokio::fs::write(destination, b"media").await?;
        self.downloads
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));
        Ok(5)
    }
}

#[derive(Default)]
struct StubEncoder {
    requests: StdMutex<Vec<EncodeRequest>>,
}

#[async_trait]
impl VideoEncoder for StubEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), EncodeError> {
        assert!(request.audio.exists(), "audio must be downloaded first");
        assert!(request.image.exists(), "cover must be available first");
        tokio::fs::write(&request.output, b"video")
            .await
            .map_err(EncodeError::Io)?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

#[derive(Default)]
struct StubHost {
    uploads: StdMutex<Vec<VideoUpload>>,
    attached: StdMutex<Vec<(String, String)>>,
    attach_failures: AtomicUsize,
}

#[async_trait]
impl VideoHost for StubHost {
    async fn authorize(&self) -> Result<AccessToken, ClientError> {
        Ok(AccessToken("token".to_string()))
    }

    async fn upload(
        &self,
        _token: &AccessToken,
        upload: &VideoUpload,
    ) -> Result<String, ClientError> {
        assert!(upload.path.exists(), "video must exist while uploading");
        self.uploads.lock().unwrap().push(upload.clone());
        Ok("video-1".to_string())
    }

    async fn attach_to_collection(
        &self,
        _token: &AccessToken,
        collection: &str,
        video_id: &str,
    ) -> Result<String, ClientError> {
        let remaining = self.attach_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.attach_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ClientError::transport("video hosting", "playlist quota exceeded"));
        }
        self.attached
            .lock()
            .unwrap()
            .push((collection.to_string(), video_id.to_string()));
        Ok("item-1".to_string())
    }
}

struct Harness {
    queue: Arc<MemoryJobQueue>,
    engine: Arc<PipelineEngine>,
    songs: Arc<StubSongs>,
    images: Arc<StubImages>,
    fetcher: Arc<StubFetcher>,
    encoder: Arc<StubEncoder>,
    host: Arc<StubHost>,
    render_settings: RenderSettings,
    workspace: TempDir,
    static_covers: TempDir,
}

impl Harness {
    fn new(songs: StubSongs, max_attempts: i32) -> Self {
        let workspace = TempDir::new().expect("workspace dir");
        let static_covers = TempDir::new().expect("static cover dir");

        let queue = Arc::new(MemoryJobQueue::new());
        let text = Arc::new(StubText);
        let songs = Arc::new(songs);
        let images = Arc::new(StubImages::default());
        let fetcher = Arc::new(StubFetcher::default());
        let encoder = Arc::new(StubEncoder::default());
        let host = Arc::new(StubHost::default());
        let render_settings = RenderSettings {
            text_model: "text-model".to_string(),
            image_model: "image-model".to_string(),
            image_size: "1792x1024".to_string(),
            static_cover_dir: static_covers.path().to_path_buf(),
        };

        let handlers = StageHandlers {
            compose: Arc::new(ComposeStage::new(
                text.clone(),
                songs.clone(),
                ComposeSettings::new("text-model", "song-model"),
            )),
            render: Arc::new(RenderStage::new(
                RenderServices {
                    songs: songs.clone(),
                    text,
                    images: images.clone(),
                    fetcher: fetcher.clone(),
                    encoder: encoder.clone(),
                },
                Workspace::new(workspace.path()),
                render_settings.clone(),
            )),
            publish: Arc::new(PublishStage::new(
                host.clone(),
                Workspace::new(workspace.path()),
                PublishSettings::default(),
            )),
        };
        let jobs: Arc<dyn JobsRepo> = queue.clone();
        let engine = Arc::new(PipelineEngine::new(jobs, handlers, max_attempts));

        Self {
            queue,
            engine,
            songs,
            images,
            fetcher,
            encoder,
            host,
            render_settings,
            workspace,
            static_covers,
        }
    }

    fn trigger(&self, defaults: TriggerDefaults) -> PipelineTrigger {
        PipelineTrigger::new(self.engine.clone(), defaults)
    }

    async fn jobs_for(&self, stage: StageName) -> Vec<JobRecord> {
        self.queue
            .list_jobs(&JobQueryFilter {
                stage: Some(stage),
                ..Default::default()
            })
            .await
            .expect("list jobs")
    }
}

fn request(profile: &str) -> TriggerRequest {
    TriggerRequest {
        profile: Some(profile.to_string()),
        styles: None,
    }
}

#[tokio::test]
async fn lo_fi_pipeline_runs_compose_render_publish_in_order() {
    let harness = Harness::new(StubSongs::default(), 3);
    let started = harness
        .trigger(TriggerDefaults::default())
        .fire(request("lo_fi"))
        .await
        .expect("pipeline starts");
    assert_eq!(started.selection, VariantSelection::LoFi);

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;

    let stages: Vec<StageName> = reports.iter().map(|report| report.stage).collect();
    assert_eq!(
        stages,
        vec![StageName::Compose, StageName::Render, StageName::Publish]
    );
    assert!(matches!(
        reports[0].result,
        Ok(DispatchOutcome::Advanced {
            next_stage: StageName::Render,
            delay,
            ..
        }) if delay == Duration::from_secs(600)
    ));
    assert!(matches!(
        reports[1].result,
        Ok(DispatchOutcome::Advanced {
            next_stage: StageName::Publish,
            delay: Duration::ZERO,
            ..
        })
    ));
    let Ok(DispatchOutcome::Finished(result)) = &reports[2].result else {
        panic!("publish should finish the pipeline: {:?}", reports[2].result);
    };
    assert_eq!(result.video_id, "video-1");
    assert_eq!(result.collection_item_id, None);

    let compose = harness.jobs_for(StageName::Compose).await;
    let render = harness.jobs_for(StageName::Render).await;
    let publish = harness.jobs_for(StageName::Publish).await;
    for job in compose.iter().chain(&render).chain(&publish) {
        assert_eq!(job.state, JobState::Completed, "job {} not completed", job.id);
        assert_eq!(job.progress, 100);
        assert_eq!(job.attempts, 1);
        assert!(job.finished_at.is_some());
        assert!(!job.logs.is_empty());
    }
    assert_eq!(compose[0].id, started.job_id);

    let delay = render[0].visible_at - compose[0].visible_at;
    assert!(delay >= time::Duration::seconds(599), "render delay was {delay}");

    let generated = harness.songs.generated.lock().unwrap().clone();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].title, "Midnight Rain");
    assert_eq!(generated[0].tags, "lofi,chill,beats,study");
    assert!(!generated[0].make_instrumental);

    let uploads = harness.host.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].title, "lo-fi chill beat - Midnight Rain");
    assert_eq!(uploads[0].category_id, "10");
    assert_eq!(uploads[0].privacy_status, "private");
    assert!(uploads[0].embeddable);

    assert_eq!(harness.images.calls.load(Ordering::SeqCst), 1);
    let downloads = harness.fetcher.downloads.lock().unwrap().clone();
    assert_eq!(downloads.len(), 2);
    for (_, path) in &downloads {
        assert!(!path.exists(), "{} should be cleaned up", path.display());
    }
    let encoded = harness.encoder.requests.lock().unwrap().clone();
    assert_eq!(encoded.len(), 1);
    assert!(encoded[0].output.starts_with(harness.workspace.path().join(SONG_ID)));
    assert!(!encoded[0].output.exists(), "published video is removed");
    assert!(
        !harness.workspace.path().join(SONG_ID).exists(),
        "scratch space is released after publishing"
    );
}

#[tokio::test]
async fn declined_generation_abandons_the_pipeline_without_a_render_job() {
    let songs = StubSongs {
        decline_generate: true,
        ..Default::default()
    };
    let harness = Harness::new(songs, 3);
    harness
        .trigger(TriggerDefaults::default())
        .fire(request("lo_fi"))
        .await
        .expect("pipeline starts");

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;

    assert_eq!(reports.len(), 1);
    let Ok(DispatchOutcome::Abandoned { reason }) = &reports[0].result else {
        panic!("expected abandonment: {:?}", reports[0].result);
    };
    assert!(reason.contains("402"), "{reason}");

    let compose = harness.jobs_for(StageName::Compose).await;
    assert_eq!(compose[0].state, JobState::Completed);
    assert_eq!(compose[0].progress, 0);
    assert!(harness.jobs_for(StageName::Render).await.is_empty());
}

#[tokio::test]
async fn transient_render_fault_is_retried_by_the_queue() {
    let songs = StubSongs {
        failing_fetches: AtomicUsize::new(1),
        ..Default::default()
    };
    let harness = Harness::new(songs, 3);
    harness
        .trigger(TriggerDefaults::default())
        .fire(request("lo_fi"))
        .await
        .expect("pipeline starts");

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;

    let stages: Vec<StageName> = reports.iter().map(|report| report.stage).collect();
    assert_eq!(
        stages,
        vec![
            StageName::Compose,
            StageName::Render,
            StageName::Render,
            StageName::Publish
        ]
    );
    assert!(matches!(reports[1].result, Err(PipelineError::Stage { .. })));
    assert!(matches!(
        reports[3].result,
        Ok(DispatchOutcome::Finished(_))
    ));

    let render = harness.jobs_for(StageName::Render).await;
    assert_eq!(render.len(), 1);
    assert_eq!(render[0].attempts, 2);
    assert_eq!(render[0].state, JobState::Completed);
    assert_eq!(harness.jobs_for(StageName::Publish).await.len(), 1);
}

#[tokio::test]
async fn render_fault_that_outlives_its_attempts_stays_failed() {
    let songs = StubSongs {
        failing_fetches: AtomicUsize::new(usize::MAX),
        ..Default::default()
    };
    let harness = Harness::new(songs, 2);
    harness
        .trigger(TriggerDefaults::default())
        .fire(request("lo_fi"))
        .await
        .expect("pipeline starts");

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;
    assert_eq!(reports.len(), 3);
    assert!(reports[1..].iter().all(|report| report.result.is_err()));

    let render = harness.jobs_for(StageName::Render).await;
    assert_eq!(render[0].state, JobState::Failed);
    assert_eq!(render[0].attempts, 2);
    assert_eq!(render[0].progress, 0);
    let last_error = render[0].last_error.clone().unwrap_or_default();
    assert!(last_error.contains("connection reset"), "{last_error}");
    assert!(harness.jobs_for(StageName::Publish).await.is_empty());
}

#[tokio::test]
async fn boom_bap_uses_the_static_cover_and_keeps_it() {
    let harness = Harness::new(StubSongs::default(), 3);
    let CoverArt::Static { file_name } = resolve(&VariantSelection::BoomBap).cover else {
        panic!("boom bap uses a static cover");
    };
    let cover = harness.static_covers.path().join(file_name);
    std::fs::write(&cover, b"png").expect("write cover");

    harness
        .trigger(TriggerDefaults::default())
        .fire(request("boom_bap"))
        .await
        .expect("pipeline starts");
    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;

    assert!(matches!(
        reports.last().map(|report| &report.result),
        Some(Ok(DispatchOutcome::Finished(_)))
    ));
    assert_eq!(harness.images.calls.load(Ordering::SeqCst), 0);
    assert!(cover.exists(), "static cover must survive cleanup");
    let encoded = harness.encoder.requests.lock().unwrap().clone();
    assert_eq!(encoded[0].image, cover);
}

#[tokio::test]
async fn missing_static_cover_fails_the_render_job() {
    let harness = Harness::new(StubSongs::default(), 1);
    harness
        .trigger(TriggerDefaults::default())
        .fire(request("boom_bap"))
        .await
        .expect("pipeline starts");

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;

    assert_eq!(reports.len(), 2);
    assert!(reports[1].result.is_err());
    let render = harness.jobs_for(StageName::Render).await;
    assert_eq!(render[0].state, JobState::Failed);
}

#[tokio::test]
async fn type_beat_carries_styles_and_collection_to_publish() {
    let harness = Harness::new(StubSongs::default(), 3);
    let defaults = TriggerDefaults {
        collections: [(Profile::TypeBeat, "PL-beats".to_string())].into(),
        ..Default::default()
    };
    let started = harness
        .trigger(defaults)
        .fire(TriggerRequest {
            profile: Some("type_beat".to_string()),
            styles: Some(["Nujabes".to_string(), "J Dilla".to_string()]),
        })
        .await
        .expect("pipeline starts");
    assert_eq!(
        started.selection,
        VariantSelection::TypeBeat {
            styles: StylePair::new("Nujabes", "J Dilla").expect("distinct styles"),
        }
    );

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;
    let Some(Ok(DispatchOutcome::Finished(result))) =
        reports.last().map(|report| &report.result)
    else {
        panic!("pipeline should finish");
    };
    assert_eq!(result.collection_item_id.as_deref(), Some("item-1"));

    let uploads = harness.host.uploads.lock().unwrap().clone();
    assert_eq!(
        uploads[0].title,
        "[FREE] Nujabes x J Dilla type beat - Midnight Rain"
    );
    assert_eq!(
        uploads[0].description,
        "Nujabes x J Dilla type beat. Free for use."
    );
    let attached = harness.host.attached.lock().unwrap().clone();
    assert_eq!(
        attached,
        vec![("PL-beats".to_string(), "video-1".to_string())]
    );
}

#[tokio::test]
async fn identical_styles_are_rejected_before_anything_is_enqueued() {
    let harness = Harness::new(StubSongs::default(), 3);
    let result = harness
        .trigger(TriggerDefaults::default())
        .fire(TriggerRequest {
            profile: Some("type_beat".to_string()),
            styles: Some(["Nujabes".to_string(), "Nujabes".to_string()]),
        })
        .await;

    assert!(result.is_err());
    assert!(harness.jobs_for(StageName::Compose).await.is_empty());
}

#[tokio::test]
async fn failed_collection_attach_does_not_upload_twice() {
    let harness = Harness::new(StubSongs::default(), 3);
    harness.host.attach_failures.store(1, Ordering::SeqCst);
    let defaults = TriggerDefaults {
        collections: [(Profile::TypeBeat, "PL-beats".to_string())].into(),
        ..Default::default()
    };
    harness
        .trigger(defaults)
        .fire(TriggerRequest {
            profile: Some("type_beat".to_string()),
            styles: Some(["Nujabes".to_string(), "J Dilla".to_string()]),
        })
        .await
        .expect("pipeline starts");

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;

    assert_eq!(reports.len(), 3);
    let Ok(DispatchOutcome::Finished(result)) = &reports[2].result else {
        panic!("publish should finish: {:?}", reports[2].result);
    };
    assert_eq!(result.video_id, "video-1");
    assert_eq!(result.collection_item_id, None);
    assert_eq!(harness.host.uploads.lock().unwrap().len(), 1);
    assert!(harness.host.attached.lock().unwrap().is_empty());

    let publish = harness.jobs_for(StageName::Publish).await;
    assert_eq!(publish[0].state, JobState::Completed);
    assert_eq!(publish[0].attempts, 1);
    assert!(
        publish[0]
            .logs
            .iter()
            .any(|entry| entry.message.contains("playlist quota exceeded"))
    );
}

#[tokio::test]
async fn publish_tolerates_a_video_that_is_already_gone() {
    let harness = Harness::new(StubSongs::default(), 3);
    harness
        .trigger(TriggerDefaults::default())
        .fire(request("lo_fi"))
        .await
        .expect("pipeline starts");

    // Run compose and render only, then drop the rendered file before publish.
    let mut reports = Vec::new();
    for _ in 0..2 {
        let job = harness
            .queue
            .claim_next(DelayPolicy::Skip)
            .await
            .expect("job is ready");
        reports.push(harness.engine.dispatch_record(&job).await);
    }
    assert!(reports.iter().all(Result::is_ok));
    let encoded = harness.encoder.requests.lock().unwrap().clone();
    std::fs::remove_file(&encoded[0].output).expect("remove video");

    let reports = harness
        .queue
        .run_until_idle(&harness.engine, DelayPolicy::Skip)
        .await;

    assert_eq!(reports.len(), 1);
    assert!(matches!(reports[0].result, Ok(DispatchOutcome::Finished(_))));
}

#[tokio::test]
async fn random_pipelines_skip_profiles_without_their_static_cover() {
    let harness = Harness::new(StubSongs::default(), 3);
    let available = harness.render_settings.renderable_profiles();
    assert_eq!(available, vec![Profile::LoFi, Profile::TypeBeat]);

    let trigger = harness.trigger(TriggerDefaults {
        available,
        ..Default::default()
    });
    for _ in 0..30 {
        let started = trigger
            .fire(TriggerRequest::default())
            .await
            .expect("pipeline starts");
        assert_ne!(started.selection.profile(), Profile::BoomBap);
    }
    assert!(trigger.fire(request("boom_bap")).await.is_err());

    let cover = Profile::BoomBap.static_cover().expect("boom bap cover");
    std::fs::write(harness.static_covers.path().join(cover), b"png").expect("write cover");
    assert_eq!(
        harness.render_settings.renderable_profiles(),
        Profile::ALL.to_vec()
    );
}
