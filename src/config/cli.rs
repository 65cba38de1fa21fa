use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the tunesmith binary.
#[derive(Debug, Parser)]
#[command(
    name = "tunesmith",
    version,
    about = "Scheduled compose, render and publish pipeline for generated music videos"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "TUNESMITH_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the control endpoint, the stage workers and the cron trigger against Postgres.
    Serve(Box<ServeArgs>),
    /// Drive one pipeline instance to completion in this process.
    Run(RunArgs),
    /// Print the resolved variant for a profile selector.
    Profiles(ProfilesArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the workspace root holding per-song scratch directories.
    #[arg(long = "render-workspace-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub workspace_root: Option<PathBuf>,

    /// Override the ffmpeg executable used for encoding.
    #[arg(long = "render-ffmpeg-path", value_name = "PATH", value_hint = ValueHint::ExecutablePath)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the control endpoint host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the control endpoint port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the delay between composing a song and rendering it.
    #[arg(long = "jobs-render-delay-seconds", value_name = "SECONDS")]
    pub jobs_render_delay_seconds: Option<u64>,

    /// Override how many times a faulted job is attempted.
    #[arg(long = "jobs-max-attempts", value_name = "COUNT")]
    pub jobs_max_attempts: Option<u32>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub render: RenderOverrides,

    /// Profile selector (lo_fi, type_beat, boom_bap). Random when omitted.
    #[arg(long, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// Two style names for profiles that use a style pair.
    #[arg(long, num_args = 2, value_names = ["FIRST", "SECOND"])]
    pub styles: Option<Vec<String>>,

    /// Start rendering as soon as the song is submitted instead of waiting.
    #[arg(long = "no-delay", action = clap::ArgAction::SetTrue)]
    pub no_delay: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ProfilesArgs {
    /// Profile selector; unknown selectors resolve to the default profile.
    #[arg(value_name = "SELECTOR", default_value = "lo_fi")]
    pub selector: String,

    /// Two style names for profiles that use a style pair.
    #[arg(long, num_args = 2, value_names = ["FIRST", "SECOND"])]
    pub styles: Option<Vec<String>>,
}
