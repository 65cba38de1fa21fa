//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::HashMap,
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use apalis_cron::Schedule;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::variant::Profile;

mod cli;

pub use cli::{
    CliArgs, Command, LoggingOverrides, ProfilesArgs, RenderOverrides, RunArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tunesmith";
const ENV_PREFIX: &str = "TUNESMITH";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_RENDER_DELAY_SECS: u64 = 600;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_SCHEDULE: &str = "0 0 0 * * Mon,Thu,Sat";
const DEFAULT_TEXT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEXT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_IMAGE_SIZE: &str = "1792x1024";
const DEFAULT_SONG_BASE_URL: &str = "http://suno-api:3000";
const DEFAULT_SONG_MODEL: &str = "chirp-v3-5";
const DEFAULT_HOSTING_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_HOSTING_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/youtube/v3";
const DEFAULT_WORKSPACE_ROOT: &str = "workspace";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_FRAME_SIZE: &str = "1920x1080";
const DEFAULT_STATIC_COVER_DIR: &str = "static";
const DEFAULT_TOKEN_PATH: &str = "token.json";
const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
const DEFAULT_CATEGORY_ID: &str = "10";
const DEFAULT_PRIVACY_STATUS: &str = "private";
const DEFAULT_LICENSE: &str = "youtube";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub jobs: JobsSettings,
    pub trigger: TriggerSettings,
    pub services: ServicesSettings,
    pub render: RenderSettings,
    pub publish: PublishSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub render_delay: Duration,
    pub max_attempts: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct TriggerSettings {
    pub schedules: Vec<Schedule>,
    pub profile: Option<Profile>,
    pub collections: HashMap<Profile, String>,
}

#[derive(Debug, Clone)]
pub struct ServicesSettings {
    pub text_base_url: Url,
    pub api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub image_size: String,
    pub song_base_url: Url,
    pub song_model: String,
    pub hosting_api_base_url: Url,
    pub hosting_upload_base_url: Url,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub workspace_root: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub frame_width: NonZeroU32,
    pub frame_height: NonZeroU32,
    pub static_cover_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub token_path: PathBuf,
    pub credentials_path: PathBuf,
    pub category_id: String,
    pub privacy_status: String,
    pub license: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(";")
            .with_list_parse_key("trigger.schedules")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Run(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_render_overrides(&args.render);
        }
        Some(Command::Profiles(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    jobs: RawJobsSettings,
    trigger: RawTriggerSettings,
    services: RawServicesSettings,
    render: RawRenderSettings,
    publish: RawPublishSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(seconds) = overrides.jobs_render_delay_seconds {
            self.jobs.render_delay_seconds = Some(seconds);
        }
        if let Some(attempts) = overrides.jobs_max_attempts {
            self.jobs.max_attempts = Some(attempts);
        }

        self.apply_logging_overrides(&overrides.logging);
        self.apply_render_overrides(&overrides.render);
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(root) = overrides.workspace_root.as_ref() {
            self.render.workspace_root = Some(root.clone());
        }
        if let Some(path) = overrides.ffmpeg_path.as_ref() {
            self.render.ffmpeg_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            jobs,
            trigger,
            services,
            render,
            publish,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            jobs: build_jobs_settings(jobs)?,
            trigger: build_trigger_settings(trigger)?,
            services: build_services_settings(services)?,
            render: build_render_settings(render)?,
            publish: build_publish_settings(publish)?,
        })
    }
}

fn build_server_settings(raw: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = raw.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = raw.port.unwrap_or(DEFAULT_PORT);
    let addr = parse_socket_addr(&host, port).map_err(|err| LoadError::invalid("server", err))?;
    Ok(ServerSettings { addr })
}

fn build_logging_settings(raw: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match raw.level {
        Some(level) => LevelFilter::from_str(&level)
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
        None => LevelFilter::INFO,
    };
    let format = if raw.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    Ok(LoggingSettings { level, format })
}

fn build_database_settings(raw: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = raw.url.filter(|url| !url.trim().is_empty());
    let max_connections = non_zero_u32(
        u64::from(raw.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)),
        "database.max_connections",
    )?;
    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_jobs_settings(raw: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let render_delay =
        Duration::from_secs(raw.render_delay_seconds.unwrap_or(DEFAULT_RENDER_DELAY_SECS));
    let max_attempts = non_zero_u32(
        u64::from(raw.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS)),
        "jobs.max_attempts",
    )?;
    Ok(JobsSettings {
        render_delay,
        max_attempts,
    })
}

fn build_trigger_settings(raw: RawTriggerSettings) -> Result<TriggerSettings, LoadError> {
    let expressions = raw
        .schedules
        .unwrap_or_else(|| vec![DEFAULT_SCHEDULE.to_string()]);
    let schedules = expressions
        .iter()
        .map(|expr| {
            Schedule::from_str(expr.trim()).map_err(|err| {
                LoadError::invalid("trigger.schedules", format!("`{expr}`: {err}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let profile = raw
        .profile
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(|value| parse_profile(value, "trigger.profile"))
        .transpose()?;

    let mut collections = HashMap::new();
    for (name, collection) in raw.collections.unwrap_or_default() {
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(LoadError::invalid(
                "trigger.collections",
                format!("collection for `{name}` must not be empty"),
            ));
        }
        collections.insert(
            parse_profile(&name, "trigger.collections")?,
            collection.to_string(),
        );
    }

    Ok(TriggerSettings {
        schedules,
        profile,
        collections,
    })
}

fn build_services_settings(raw: RawServicesSettings) -> Result<ServicesSettings, LoadError> {
    Ok(ServicesSettings {
        text_base_url: parse_url(raw.text_base_url, DEFAULT_TEXT_BASE_URL, "services.text_base_url")?,
        api_key: raw.api_key.filter(|key| !key.trim().is_empty()),
        text_model: non_empty(raw.text_model, DEFAULT_TEXT_MODEL, "services.text_model")?,
        image_model: non_empty(raw.image_model, DEFAULT_IMAGE_MODEL, "services.image_model")?,
        image_size: non_empty(raw.image_size, DEFAULT_IMAGE_SIZE, "services.image_size")?,
        song_base_url: parse_url(raw.song_base_url, DEFAULT_SONG_BASE_URL, "services.song_base_url")?,
        song_model: non_empty(raw.song_model, DEFAULT_SONG_MODEL, "services.song_model")?,
        hosting_api_base_url: parse_url(
            raw.hosting_api_base_url,
            DEFAULT_HOSTING_API_BASE_URL,
            "services.hosting_api_base_url",
        )?,
        hosting_upload_base_url: parse_url(
            raw.hosting_upload_base_url,
            DEFAULT_HOSTING_UPLOAD_BASE_URL,
            "services.hosting_upload_base_url",
        )?,
    })
}

fn build_render_settings(raw: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let frame = non_empty(raw.frame_size, DEFAULT_FRAME_SIZE, "render.frame_size")?;
    let (frame_width, frame_height) = parse_frame_size(&frame)?;
    Ok(RenderSettings {
        workspace_root: non_empty_path(
            raw.workspace_root,
            DEFAULT_WORKSPACE_ROOT,
            "render.workspace_root",
        )?,
        ffmpeg_path: non_empty_path(raw.ffmpeg_path, DEFAULT_FFMPEG_PATH, "render.ffmpeg_path")?,
        frame_width,
        frame_height,
        static_cover_dir: non_empty_path(
            raw.static_cover_dir,
            DEFAULT_STATIC_COVER_DIR,
            "render.static_cover_dir",
        )?,
    })
}

fn build_publish_settings(raw: RawPublishSettings) -> Result<PublishSettings, LoadError> {
    Ok(PublishSettings {
        token_path: non_empty_path(raw.token_path, DEFAULT_TOKEN_PATH, "publish.token_path")?,
        credentials_path: non_empty_path(
            raw.credentials_path,
            DEFAULT_CREDENTIALS_PATH,
            "publish.credentials_path",
        )?,
        category_id: non_empty(raw.category_id, DEFAULT_CATEGORY_ID, "publish.category_id")?,
        privacy_status: non_empty(
            raw.privacy_status,
            DEFAULT_PRIVACY_STATUS,
            "publish.privacy_status",
        )?,
        license: non_empty(raw.license, DEFAULT_LICENSE, "publish.license")?,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    render_delay_seconds: Option<u64>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTriggerSettings {
    schedules: Option<Vec<String>>,
    profile: Option<String>,
    collections: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServicesSettings {
    text_base_url: Option<String>,
    api_key: Option<String>,
    text_model: Option<String>,
    image_model: Option<String>,
    image_size: Option<String>,
    song_base_url: Option<String>,
    song_model: Option<String>,
    hosting_api_base_url: Option<String>,
    hosting_upload_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    workspace_root: Option<PathBuf>,
    ffmpeg_path: Option<PathBuf>,
    frame_size: Option<String>,
    static_cover_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPublishSettings {
    token_path: Option<PathBuf>,
    credentials_path: Option<PathBuf>,
    category_id: Option<String>,
    privacy_status: Option<String>,
    license: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_empty(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let value = value.unwrap_or_else(|| PathBuf::from(default));
    if value.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(value)
}

fn parse_url(value: Option<String>, default: &str, key: &'static str) -> Result<Url, LoadError> {
    let raw = non_empty(value, default, key)?;
    Url::parse(&raw).map_err(|err| LoadError::invalid(key, format!("`{raw}`: {err}")))
}

/// Profiles in configuration must be spelled exactly; the lenient selector is for requests.
fn parse_profile(value: &str, key: &'static str) -> Result<Profile, LoadError> {
    let normalized = value.trim();
    Profile::ALL
        .into_iter()
        .find(|profile| profile.as_str() == normalized)
        .ok_or_else(|| LoadError::invalid(key, format!("unknown profile `{value}`")))
}

fn parse_frame_size(value: &str) -> Result<(NonZeroU32, NonZeroU32), LoadError> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| LoadError::invalid("render.frame_size", "expected WIDTHxHEIGHT"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u64>()
            .map_err(|err| LoadError::invalid("render.frame_size", format!("`{value}`: {err}")))
            .and_then(|value| non_zero_u32(value, "render.frame_size"))
    };
    Ok((parse(width)?, parse(height)?))
}

#[cfg(test)]
mod tests;
