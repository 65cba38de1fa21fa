use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_cron::{CronStream, Schedule};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use tunesmith::{
    application::{
        error::AppError,
        jobs::{
            ComposeSettings, ComposeStage, DispatchOutcome, JobWorkerContext, PipelineEngine,
            PipelineTrigger, PublishSettings, PublishStage, RenderServices, RenderSettings,
            RenderStage, StageHandlers, TriggerContext, TriggerDefaults, TriggerError,
            TriggerRequest, process_compose_job, process_pipeline_tick, process_publish_job,
            process_render_job,
        },
        repos::JobsRepo,
        workspace::Workspace,
    },
    config,
    domain::{
        types::StageName,
        variant::{Profile, StylePair, VariantSelection, resolve},
    },
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        ffmpeg::FfmpegEncoder,
        http::{self, HttpState},
        memory::{DelayPolicy, MemoryJobQueue},
        services::{
            self, HttpMediaFetcher, OpenAiClient, SunoClient, YouTubeClient, YouTubeSettings,
        },
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    if let config::Command::Profiles(args) = &command {
        return print_profile(args);
    }

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Run(args) => run_once(settings, args).await,
        config::Command::Profiles(_) => Ok(()),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let jobs: Arc<dyn JobsRepo> = repositories.clone();
    let engine = build_engine(jobs.clone(), &settings)?;
    let trigger = Arc::new(PipelineTrigger::new(
        engine.clone(),
        trigger_defaults(&settings)?,
    ));

    let monitor_handle = spawn_job_monitor(
        &repositories,
        JobWorkerContext { engine },
        TriggerContext {
            trigger: trigger.clone(),
        },
        &settings.trigger.schedules,
    );

    let state = HttpState {
        trigger,
        jobs,
        database: Some(repositories),
    };
    let result = serve_http(&settings, state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

async fn run_once(settings: config::Settings, args: config::RunArgs) -> Result<(), AppError> {
    let queue = Arc::new(MemoryJobQueue::new());
    let jobs: Arc<dyn JobsRepo> = queue.clone();
    let engine = build_engine(jobs, &settings)?;
    let trigger = PipelineTrigger::new(engine.clone(), trigger_defaults(&settings)?);

    let request = TriggerRequest {
        profile: args.profile,
        styles: args.styles.map(style_pair_arg).transpose()?,
    };
    let started = trigger.fire(request).await.map_err(trigger_error)?;
    info!(
        target = "tunesmith::run",
        job_id = %started.job_id,
        profile = started.selection.profile().as_str(),
        no_delay = args.no_delay,
        "Starting pipeline"
    );

    let policy = if args.no_delay {
        DelayPolicy::Skip
    } else {
        DelayPolicy::Honour
    };
    let reports = queue.run_until_idle(&engine, policy).await;

    for report in reports.iter().rev() {
        match &report.result {
            Ok(DispatchOutcome::Finished(result)) => {
                info!(
                    target = "tunesmith::run",
                    video_id = %result.video_id,
                    "Pipeline finished"
                );
                return Ok(());
            }
            Ok(DispatchOutcome::Abandoned { reason }) => {
                warn!(
                    target = "tunesmith::run",
                    stage = report.stage.as_str(),
                    reason = %reason,
                    "Pipeline abandoned"
                );
                return Ok(());
            }
            Ok(DispatchOutcome::Advanced { .. }) => continue,
            Err(err) => {
                return Err(AppError::unexpected(format!(
                    "{} job {} failed after {} attempts: {err}",
                    report.stage, report.job_id, report.attempt
                )));
            }
        }
    }

    Err(AppError::unexpected("pipeline stopped before it finished"))
}

fn print_profile(args: &config::ProfilesArgs) -> Result<(), AppError> {
    let profile = Profile::from_selector(&args.selector);
    let styles = match args.styles.clone().map(style_pair_arg).transpose()? {
        Some([first, second]) => Some(StylePair::new(first, second)?),
        None => None,
    };
    let selection = VariantSelection::choose(profile, styles, &mut rand::rng())?;
    let variant = resolve(&selection);

    let rendered = serde_json::to_string_pretty(&variant)
        .map_err(|err| AppError::unexpected(format!("failed to encode variant: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn style_pair_arg(styles: Vec<String>) -> Result<[String; 2], AppError> {
    <[String; 2]>::try_from(styles)
        .map_err(|_| AppError::validation("--styles expects exactly two names"))
}

fn trigger_error(err: TriggerError) -> AppError {
    match err {
        TriggerError::Variant(err) => AppError::from(err),
        TriggerError::Pipeline(err) => AppError::unexpected(err.to_string()),
    }
}

fn trigger_defaults(settings: &config::Settings) -> Result<TriggerDefaults, AppError> {
    let available = render_settings(settings).renderable_profiles();
    for profile in Profile::ALL {
        if !available.contains(&profile) {
            warn!(
                target = "tunesmith::trigger",
                profile = profile.as_str(),
                static_cover_dir = %settings.render.static_cover_dir.display(),
                "Profile disabled: static cover is missing"
            );
        }
    }

    if let Some(profile) = settings
        .trigger
        .profile
        .filter(|profile| !available.contains(profile))
    {
        return Err(AppError::from(InfraError::configuration(format!(
            "trigger.profile {} needs a static cover in {}",
            profile.as_str(),
            settings.render.static_cover_dir.display()
        ))));
    }

    Ok(TriggerDefaults {
        profile: settings.trigger.profile,
        collections: settings.trigger.collections.clone(),
        available,
    })
}

fn render_settings(settings: &config::Settings) -> RenderSettings {
    RenderSettings {
        text_model: settings.services.text_model.clone(),
        image_model: settings.services.image_model.clone(),
        image_size: settings.services.image_size.clone(),
        static_cover_dir: settings.render.static_cover_dir.clone(),
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresStorage::setup(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresRepositories::ensure_schema(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_engine(
    jobs: Arc<dyn JobsRepo>,
    settings: &config::Settings,
) -> Result<Arc<PipelineEngine>, AppError> {
    let http = services::http_client()
        .map_err(|err| InfraError::configuration(format!("failed to build http client: {err}")))?;
    let api_key = settings
        .services
        .api_key
        .clone()
        .ok_or_else(|| InfraError::configuration("services.api_key is not configured"))?;

    let openai = Arc::new(OpenAiClient::new(
        http.clone(),
        settings.services.text_base_url.clone(),
        api_key,
    ));
    let suno = Arc::new(SunoClient::new(
        http.clone(),
        settings.services.song_base_url.clone(),
    ));
    let youtube = Arc::new(YouTubeClient::new(
        http.clone(),
        YouTubeSettings {
            token_path: settings.publish.token_path.clone(),
            credentials_path: settings.publish.credentials_path.clone(),
            api_base: settings.services.hosting_api_base_url.clone(),
            upload_base: settings.services.hosting_upload_base_url.clone(),
        },
    ));
    let encoder = Arc::new(FfmpegEncoder::new(
        settings.render.ffmpeg_path.clone(),
        settings.render.frame_width.get(),
        settings.render.frame_height.get(),
    ));

    let mut compose_settings = ComposeSettings::new(
        settings.services.text_model.clone(),
        settings.services.song_model.clone(),
    );
    compose_settings.render_delay = settings.jobs.render_delay;

    let workspace = Workspace::new(settings.render.workspace_root.clone());
    let render = RenderStage::new(
        RenderServices {
            songs: suno.clone(),
            text: openai.clone(),
            images: openai.clone(),
            fetcher: Arc::new(HttpMediaFetcher::new(http)),
            encoder,
        },
        workspace.clone(),
        render_settings(settings),
    );
    let publish = PublishStage::new(
        youtube,
        workspace,
        PublishSettings {
            category_id: settings.publish.category_id.clone(),
            privacy_status: settings.publish.privacy_status.clone(),
            license: settings.publish.license.clone(),
        },
    );

    let handlers = StageHandlers {
        compose: Arc::new(ComposeStage::new(openai, suno, compose_settings)),
        render: Arc::new(render),
        publish: Arc::new(publish),
    };
    let max_attempts = i32::try_from(settings.jobs.max_attempts.get())
        .map_err(|_| AppError::validation("jobs.max_attempts exceeds the supported range"))?;

    Ok(Arc::new(PipelineEngine::new(jobs, handlers, max_attempts)))
}

fn spawn_job_monitor(
    repositories: &PostgresRepositories,
    context: JobWorkerContext,
    trigger: TriggerContext,
    schedules: &[Schedule],
) -> tokio::task::JoinHandle<()> {
    // Each stage runs one job at a time.
    let compose_worker = WorkerBuilder::new("compose-worker")
        .concurrency(1)
        .data(context.clone())
        .backend(stage_storage(repositories, StageName::Compose))
        .build_fn(process_compose_job);
    let render_worker = WorkerBuilder::new("render-worker")
        .concurrency(1)
        .data(context.clone())
        .backend(stage_storage(repositories, StageName::Render))
        .build_fn(process_render_job);
    let publish_worker = WorkerBuilder::new("publish-worker")
        .concurrency(1)
        .data(context)
        .backend(stage_storage(repositories, StageName::Publish))
        .build_fn(process_publish_job);

    let mut monitor = Monitor::new()
        .register(compose_worker)
        .register(render_worker)
        .register(publish_worker);

    for (index, schedule) in schedules.iter().enumerate() {
        let worker = WorkerBuilder::new(format!("pipeline-trigger-{index}"))
            .data(trigger.clone())
            .backend(CronStream::new(schedule.clone()))
            .build_fn(process_pipeline_tick);
        monitor = monitor.register(worker);
    }

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

fn stage_storage<T>(repositories: &PostgresRepositories, stage: StageName) -> PostgresStorage<T>
where
    T: Serialize + DeserializeOwned,
{
    PostgresStorage::new_with_config(
        repositories.pool().clone(),
        ApalisSqlConfig::new(stage.as_str()),
    )
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "tunesmith::serve",
        addr = %settings.server.addr,
        "Control endpoint listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
