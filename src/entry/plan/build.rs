use std::path::{Path, PathBuf};

use clap::ArgMatches;

use crate::app::LocalRun;
use crate::args::{DEFAULT_ROUND_INTERVAL, LoadArgs};
use crate::engine::{LoadMode, LoadProfile};
use crate::error::{AppError, AppResult, ValidationError};
use crate::http::HttpClientSettings;
use crate::scenario::{UrlListScenario, read_url_file};

pub(crate) fn build_plan(mut args: LoadArgs, matches: &ArgMatches) -> AppResult<LocalRun> {
    if let Some(config) = crate::config::load_config(args.config.as_deref())? {
        crate::config::apply_config(&mut args, matches, &config)?;
    }

    let urls = collect_urls(&args)?;
    if urls.is_empty() {
        tracing::error!("Missing URL (set --url, --urls-file or provide urls in config).");
        return Err(AppError::validation(ValidationError::MissingUrl));
    }

    let profile = build_profile(&args)?;
    let http = HttpClientSettings {
        connect_timeout: args.connect_timeout,
        insecure: args.insecure,
        redirect_limit: args.redirect_limit,
        pool_size: args.concurrency.get(),
    };
    let scenario = UrlListScenario::new(&urls, args.method)?
        .with_headers(args.headers)
        .with_body(args.data.as_deref())
        .with_expected_status(args.expected_status)
        .with_body_contains(args.body_contains);

    Ok(LocalRun {
        profile,
        scenario,
        http,
        preflight: args.preflight,
        snapshot_out: args.snapshot_out.map(PathBuf::from),
    })
}

fn collect_urls(args: &LoadArgs) -> AppResult<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(path) = args.urls_file.as_deref() {
        urls.extend(read_url_file(Path::new(path))?);
    }
    Ok(urls)
}

fn resolve_mode(args: &LoadArgs) -> Result<LoadMode, ValidationError> {
    match (args.rate, args.round_size) {
        (Some(_), Some(_)) => Err(ValidationError::RateRoundsConflict),
        (None, Some(size)) => Ok(LoadMode::Rounds {
            size: size.get(),
            interval: args.round_interval.unwrap_or(DEFAULT_ROUND_INTERVAL),
        }),
        (Some(_), None) | (None, None) if args.round_interval.is_some() => {
            Err(ValidationError::RoundIntervalRequiresRoundSize)
        }
        (Some(rate), None) => Ok(LoadMode::Rate {
            per_second: rate.get(),
        }),
        (None, None) => Ok(LoadMode::Concurrency),
    }
}

/// Engine tunables left unset keep the profile builder's defaults.
fn build_profile(args: &LoadArgs) -> AppResult<LoadProfile> {
    let mut builder = LoadProfile::builder(args.concurrency.get())
        .mode(resolve_mode(args)?)
        .steady(args.duration)
        .request_cap(args.requests.map(|value| value.get()))
        .buffer_size(args.buffer_size.map(|value| value.get()));

    if let Some(ramp) = args.ramp {
        builder = builder.ramp(ramp);
    }
    if let Some(timeout) = args.request_timeout {
        builder = builder.request_timeout(timeout);
    }
    if let Some(timeout) = args.backpressure_timeout {
        builder = builder.backpressure_timeout(timeout);
    }
    if let Some(grace) = args.drain_grace {
        builder = builder.drain_grace(grace);
    }
    if let Some(budget) = args.fault_budget {
        builder = builder.fault_budget(budget);
    }
    if let Some(interval) = args.snapshot_interval {
        builder = builder.snapshot_interval(interval);
    }
    if let Some(window) = args.throughput_window {
        builder = builder.throughput_window_secs(window.get());
    }

    Ok(builder.build()?)
}
