use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{LoadArgs, PositiveU64, PositiveUsize, parse_header};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Applies configuration values to CLI arguments. A value given on the
/// command line always wins over the file.
///
/// # Errors
///
/// Returns an error when config values are invalid or conflict with each other.
pub fn apply_config(
    args: &mut LoadArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    apply_target_config(args, matches, config)?;
    apply_load_config(args, matches, config)?;
    apply_engine_config(args, matches, config)
}

fn apply_target_config(
    args: &mut LoadArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if config.url.is_some() && config.urls.is_some() {
        return Err(AppError::config(ConfigError::Conflict {
            left: "url",
            right: "urls",
        }));
    }

    if !is_cli(matches, "urls") {
        if let Some(urls) = config.urls.as_ref() {
            args.urls.clone_from(urls);
        } else if let Some(url) = config.url.as_ref() {
            args.urls = vec![url.clone()];
        }
    }

    if !is_cli(matches, "urls_file")
        && let Some(path) = config.urls_file.as_ref()
    {
        args.urls_file = Some(path.clone());
    }

    if !is_cli(matches, "method")
        && let Some(method) = config.method
    {
        args.method = method;
    }

    if !is_cli(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        args.headers = parse_headers(headers)?;
    }

    if !is_cli(matches, "data")
        && let Some(data) = config.data.as_ref()
    {
        args.data = Some(data.clone());
    }

    if !is_cli(matches, "expected_status")
        && let Some(status) = config.expected_status
    {
        args.expected_status = status;
    }

    if !is_cli(matches, "body_contains")
        && let Some(fragment) = config.body_contains.as_ref()
    {
        args.body_contains = Some(fragment.clone());
    }

    if !is_cli(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = timeout.to_duration("connect_timeout")?;
    }

    if !is_cli(matches, "insecure")
        && let Some(insecure) = config.insecure
    {
        args.insecure = insecure;
    }

    if !is_cli(matches, "redirect_limit")
        && let Some(limit) = config.redirect_limit
    {
        args.redirect_limit = limit;
    }

    if !is_cli(matches, "preflight")
        && let Some(preflight) = config.preflight
    {
        args.preflight = preflight;
    }

    Ok(())
}

fn apply_load_config(
    args: &mut LoadArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if config.rate.is_some() && config.round_size.is_some() {
        return Err(AppError::config(ConfigError::Conflict {
            left: "rate",
            right: "round_size",
        }));
    }

    if !is_cli(matches, "concurrency")
        && let Some(concurrency) = config.concurrency
    {
        args.concurrency = ensure_positive_usize(concurrency, "concurrency")?;
    }

    if !is_cli(matches, "requests")
        && let Some(requests) = config.requests
    {
        args.requests = Some(ensure_positive_u64(requests, "requests")?);
    }

    if !is_cli(matches, "duration")
        && let Some(duration) = config.duration.as_ref()
    {
        args.duration = Some(duration.to_duration("duration")?);
    }

    if !is_cli(matches, "ramp")
        && let Some(ramp) = config.ramp.as_ref()
    {
        args.ramp = Some(ramp.to_duration("ramp")?);
    }

    // Mode flags from the command line replace the file's mode entirely.
    let cli_mode = is_cli(matches, "rate") || is_cli(matches, "round_size");
    if !cli_mode {
        if let Some(rate) = config.rate {
            args.rate = Some(ensure_positive_u64(rate, "rate")?);
        }
        if let Some(size) = config.round_size {
            args.round_size = Some(ensure_positive_u64(size, "round_size")?);
        }
    }

    if !is_cli(matches, "round_interval")
        && let Some(interval) = config.round_interval.as_ref()
    {
        args.round_interval = Some(interval.to_duration("round_interval")?);
    }

    Ok(())
}

fn apply_engine_config(
    args: &mut LoadArgs,
    matches: &ArgMatches,
    config: &ConfigFile,
) -> AppResult<()> {
    if !is_cli(matches, "request_timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.request_timeout = Some(timeout.to_duration("timeout")?);
    }

    if !is_cli(matches, "buffer_size")
        && let Some(size) = config.buffer_size
    {
        args.buffer_size = Some(ensure_positive_usize(size, "buffer_size")?);
    }

    if !is_cli(matches, "backpressure_timeout")
        && let Some(timeout) = config.backpressure_timeout.as_ref()
    {
        args.backpressure_timeout = Some(timeout.to_duration("backpressure_timeout")?);
    }

    if !is_cli(matches, "drain_grace")
        && let Some(grace) = config.drain_grace.as_ref()
    {
        args.drain_grace = Some(grace.to_duration("drain_grace")?);
    }

    if !is_cli(matches, "fault_budget")
        && let Some(budget) = config.fault_budget
    {
        args.fault_budget = Some(budget);
    }

    if !is_cli(matches, "snapshot_interval")
        && let Some(interval) = config.snapshot_interval.as_ref()
    {
        args.snapshot_interval = Some(interval.to_duration("snapshot_interval")?);
    }

    if !is_cli(matches, "throughput_window")
        && let Some(window) = config.throughput_window
    {
        args.throughput_window = Some(ensure_positive_u64(window, "throughput_window")?);
    }

    if !is_cli(matches, "snapshot_out")
        && let Some(path) = config.snapshot_out.as_ref()
    {
        args.snapshot_out = Some(path.clone());
    }

    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_u64(value: u64, field: &str) -> AppResult<PositiveU64> {
    PositiveU64::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn ensure_positive_usize(value: usize, field: &str) -> AppResult<PositiveUsize> {
    PositiveUsize::try_from(value).map_err(|err| {
        AppError::config(ConfigError::FieldMustBePositive {
            field: field.to_owned(),
            source: err,
        })
    })
}

fn parse_headers(headers: &[String]) -> AppResult<Vec<(String, String)>> {
    let mut parsed = Vec::with_capacity(headers.len());
    for header in headers {
        parsed.push(
            parse_header(header)
                .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
        );
    }
    Ok(parsed)
}
