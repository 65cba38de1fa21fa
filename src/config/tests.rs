use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        logging: LoggingOverrides {
            log_level: Some("debug".to_string()),
            log_json: None,
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_describe_the_weekly_pipeline() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.jobs.render_delay, Duration::from_secs(600));
    assert_eq!(settings.jobs.max_attempts.get(), 3);
    assert_eq!(settings.trigger.schedules.len(), 1);
    assert!(settings.trigger.profile.is_none());
    assert_eq!(settings.services.text_model, "gpt-3.5-turbo");
    assert_eq!(settings.services.image_model, "dall-e-3");
    assert_eq!(settings.services.image_size, "1792x1024");
    assert_eq!(settings.services.song_model, "chirp-v3-5");
    assert_eq!(settings.services.song_base_url.as_str(), "http://suno-api:3000/");
    assert_eq!(settings.render.frame_width.get(), 1920);
    assert_eq!(settings.render.frame_height.get(), 1080);
    assert_eq!(settings.publish.category_id, "10");
    assert_eq!(settings.publish.privacy_status, "private");
    assert_eq!(settings.publish.license, "youtube");
    assert_eq!(settings.publish.token_path, PathBuf::from("token.json"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        logging: LoggingOverrides {
            log_level: None,
            log_json: Some(true),
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::try_parse_from(["tunesmith"]).expect("parse");
    assert!(args.command.is_none());
}

#[test]
fn run_command_accepts_profile_styles_and_no_delay() {
    let args = CliArgs::try_parse_from([
        "tunesmith",
        "run",
        "--profile",
        "type_beat",
        "--styles",
        "Nujabes",
        "J Dilla",
        "--no-delay",
    ])
    .expect("parse");

    let Some(Command::Run(run)) = args.command else {
        panic!("expected run command");
    };
    assert_eq!(run.profile.as_deref(), Some("type_beat"));
    assert_eq!(
        run.styles,
        Some(vec!["Nujabes".to_string(), "J Dilla".to_string()])
    );
    assert!(run.no_delay);
}

#[test]
fn run_command_rejects_a_single_style() {
    let result = CliArgs::try_parse_from(["tunesmith", "run", "--styles", "Nujabes"]);
    assert!(result.is_err());
}

#[test]
fn profiles_command_defaults_selector() {
    let args = CliArgs::try_parse_from(["tunesmith", "profiles"]).expect("parse");
    let Some(Command::Profiles(profiles)) = args.command else {
        panic!("expected profiles command");
    };
    assert_eq!(profiles.selector, "lo_fi");
}

#[test]
fn zero_max_attempts_is_rejected() {
    let mut raw = RawSettings::default();
    raw.jobs.max_attempts = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero attempts");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "jobs.max_attempts",
            ..
        }
    ));
}

#[test]
fn invalid_cron_expression_is_rejected() {
    let mut raw = RawSettings::default();
    raw.trigger.schedules = Some(vec!["every tuesday".to_string()]);

    let err = Settings::from_raw(raw).expect_err("bad schedule");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "trigger.schedules",
            ..
        }
    ));
}

#[test]
fn collections_are_keyed_by_profile() {
    let mut raw = RawSettings::default();
    raw.trigger.profile = Some("boom_bap".to_string());
    raw.trigger.collections = Some(HashMap::from([
        ("lo_fi".to_string(), "PL-lofi".to_string()),
        ("type_beat".to_string(), "PL-beats".to_string()),
    ]));

    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.trigger.profile, Some(Profile::BoomBap));
    assert_eq!(
        settings.trigger.collections.get(&Profile::LoFi).map(String::as_str),
        Some("PL-lofi")
    );
    assert_eq!(
        settings
            .trigger
            .collections
            .get(&Profile::TypeBeat)
            .map(String::as_str),
        Some("PL-beats")
    );
}

#[test]
fn unknown_collection_profile_is_rejected() {
    let mut raw = RawSettings::default();
    raw.trigger.collections = Some(HashMap::from([(
        "synthwave".to_string(),
        "PL-x".to_string(),
    )]));

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn frame_size_must_have_two_dimensions() {
    let mut raw = RawSettings::default();
    raw.render.frame_size = Some("1280".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.render.frame_size = Some("1280x0".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.render.frame_size = Some("1280x720".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.frame_width.get(), 1280);
    assert_eq!(settings.render.frame_height.get(), 720);
}

#[test]
fn blank_model_names_are_rejected() {
    let mut raw = RawSettings::default();
    raw.services.text_model = Some("  ".to_string());

    let err = Settings::from_raw(raw).expect_err("blank model");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "services.text_model",
            ..
        }
    ));
}

#[test]
fn render_overrides_apply_to_run_command() {
    let mut raw = RawSettings::default();
    raw.apply_render_overrides(&RenderOverrides {
        workspace_root: Some(PathBuf::from("/tmp/tunesmith")),
        ffmpeg_path: None,
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.workspace_root, PathBuf::from("/tmp/tunesmith"));
    assert_eq!(settings.render.ffmpeg_path, PathBuf::from("ffmpeg"));
}
