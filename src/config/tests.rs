use super::{apply_config, load_config, load_config_file, types::DurationValue};
use clap::{CommandFactory, FromArgMatches};
use std::time::Duration;
use tempfile::tempdir;

use crate::args::{HttpMethod, LoadArgs};
use crate::error::{AppError, AppResult, ConfigError};

fn parse_with_config(cli: &[&str], path: &std::path::Path) -> AppResult<LoadArgs> {
    let matches = LoadArgs::command().try_get_matches_from(cli)?;
    let mut args = LoadArgs::from_arg_matches(&matches)?;
    let config = load_config_file(path)?;
    apply_config(&mut args, &matches, &config)?;
    Ok(args)
}

#[test]
fn parse_toml_config() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("loadpulse.toml");
    let content = r#"
urls = ["http://localhost:3000/a", "http://localhost:3000/b"]
method = "post"
headers = ["X-Run: nightly"]
data = "{\"n\": {{seq}}}"
concurrency = 25
duration = "2m"
ramp = 10
rate = 400
timeout = "1500ms"
"#;
    std::fs::write(&path, content)?;

    let config = load_config_file(&path)?;
    if config.urls.as_ref().map(Vec::len) != Some(2) {
        return Err(AppError::config("Unexpected urls"));
    }
    if config.method != Some(HttpMethod::Post) {
        return Err(AppError::config("Unexpected method"));
    }
    if config.ramp != Some(DurationValue::Seconds(10)) {
        return Err(AppError::config("Bare numbers must parse as seconds"));
    }
    let timeout = config
        .timeout
        .as_ref()
        .map(|value| value.to_duration("timeout"))
        .transpose()?;
    if timeout != Some(Duration::from_millis(1_500)) {
        return Err(AppError::config("Unexpected timeout"));
    }
    Ok(())
}

#[test]
fn parse_json_config() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("loadpulse.json");
    let content = r#"{
  "url": "http://localhost:3000",
  "status": 204,
  "round_size": 20,
  "round_interval": "250ms",
  "requests": 200
}"#;
    std::fs::write(&path, content)?;

    let config = load_config_file(&path)?;
    if config.url.as_deref() != Some("http://localhost:3000") {
        return Err(AppError::config("Unexpected url"));
    }
    if config.expected_status != Some(204) || config.round_size != Some(20) {
        return Err(AppError::config("Unexpected status/round size"));
    }
    Ok(())
}

#[test]
fn unsupported_extension_is_rejected() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("loadpulse.yaml");
    std::fs::write(&path, "url: http://localhost")?;
    match load_config_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        other => Err(AppError::config(format!("Unexpected result: {:?}", other))),
    }
}

#[test]
fn explicit_missing_config_is_an_error() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("missing.toml");
    let path_str = path.to_string_lossy().into_owned();
    match load_config(Some(path_str.as_str())) {
        Err(AppError::Config(ConfigError::ReadConfig { .. })) => Ok(()),
        other => Err(AppError::config(format!("Unexpected result: {:?}", other))),
    }
}

#[test]
fn cli_values_win_over_config() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("loadpulse.toml");
    std::fs::write(
        &path,
        r#"
url = "http://from-config"
concurrency = 8
requests = 500
expected_status = 201
drain_grace = "3s"
"#,
    )?;

    let args = parse_with_config(
        &["loadpulse", "-u", "http://from-cli", "-c", "4"],
        &path,
    )?;
    if args.urls != ["http://from-cli"] {
        return Err(AppError::config(format!("Unexpected urls: {:?}", args.urls)));
    }
    if args.concurrency.get() != 4 {
        return Err(AppError::config("CLI concurrency must win"));
    }
    if args.requests.map(|cap| cap.get()) != Some(500) {
        return Err(AppError::config("Config request cap must apply"));
    }
    if args.expected_status != 201 {
        return Err(AppError::config("Config status must replace the default"));
    }
    if args.drain_grace != Some(Duration::from_secs(3)) {
        return Err(AppError::config("Config drain grace must apply"));
    }
    Ok(())
}

#[test]
fn cli_mode_replaces_config_mode() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("loadpulse.toml");
    std::fs::write(&path, "url = \"http://x\"\nround_size = 10\n")?;

    let args = parse_with_config(&["loadpulse", "--rate", "50", "-t", "5s"], &path)?;
    if args.round_size.is_some() {
        return Err(AppError::config("Config round size must not mix with CLI rate"));
    }
    if args.rate.map(|rate| rate.get()) != Some(50) {
        return Err(AppError::config("Unexpected rate"));
    }
    Ok(())
}

#[test]
fn conflicting_config_values_are_rejected() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("loadpulse.toml");
    std::fs::write(&path, "url = \"http://a\"\nurls = [\"http://b\"]\n")?;
    match parse_with_config(&["loadpulse"], &path) {
        Err(AppError::Config(ConfigError::Conflict { left, right }))
            if left == "url" && right == "urls" =>
        {
            Ok(())
        }
        other => Err(AppError::config(format!("Unexpected result: {:?}", other))),
    }
}

#[test]
fn zero_values_in_config_are_rejected() -> AppResult<()> {
    let dir = tempdir()?;
    let path = dir.path().join("loadpulse.toml");
    std::fs::write(&path, "url = \"http://a\"\nconcurrency = 0\n")?;
    match parse_with_config(&["loadpulse"], &path) {
        Err(AppError::Config(ConfigError::FieldMustBePositive { field, .. }))
            if field == "concurrency" =>
        {
            Ok(())
        }
        other => Err(AppError::config(format!("Unexpected result: {:?}", other))),
    }
}

#[test]
fn zero_duration_in_config_is_rejected() -> AppResult<()> {
    match DurationValue::Seconds(0).to_duration("duration") {
        Err(ConfigError::ZeroDuration { field }) if field == "duration" => Ok(()),
        other => Err(AppError::config(format!("Unexpected result: {:?}", other))),
    }
}
