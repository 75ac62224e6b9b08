use clap::Parser;
use std::time::Duration;

use super::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_EXPECTED_STATUS, DEFAULT_REDIRECT_LIMIT,
};
use super::parsers::{parse_duration_arg, parse_header, parse_positive_u64, parse_positive_usize};
use super::types::{HttpMethod, PositiveU64, PositiveUsize};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Async HTTP load generator - closed-loop, fixed-rate and batched-round load with live latency statistics.",
    next_help_heading = "Advanced Options"
)]
pub struct LoadArgs {
    /// Target URL (repeatable, requests cycle through the list)
    #[arg(long = "url", short = 'u', help_heading = "Common Options")]
    pub urls: Vec<String>,

    /// Read target URLs from a newline-delimited file
    #[arg(long = "urls-file", help_heading = "Common Options")]
    pub urls_file: Option<String>,

    /// HTTP method to use
    #[arg(
        long,
        short = 'X',
        default_value = "get",
        ignore_case = true,
        help_heading = "Common Options"
    )]
    pub method: HttpMethod,

    /// HTTP headers in 'Key: Value' format (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body ({{seq}} and {{timestamp_ms}} are rendered per request)
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Status code a response must carry to count as success
    #[arg(long = "expected-status", default_value_t = DEFAULT_EXPECTED_STATUS)]
    pub expected_status: u16,

    /// Fail responses whose body does not contain this text
    #[arg(long = "body-contains")]
    pub body_contains: Option<String>,

    /// Number of concurrent workers
    #[arg(
        long,
        short = 'c',
        default_value = DEFAULT_CONCURRENCY,
        value_parser = parse_positive_usize,
        help_heading = "Common Options"
    )]
    pub concurrency: PositiveUsize,

    /// Stop after this many requests
    #[arg(
        long = "requests",
        short = 'n',
        value_parser = parse_positive_u64,
        help_heading = "Common Options"
    )]
    pub requests: Option<PositiveU64>,

    /// Steady-state duration after the ramp (supports ms/s/m/h)
    #[arg(
        long = "duration",
        short = 't',
        value_parser = parse_duration_arg,
        help_heading = "Common Options"
    )]
    pub duration: Option<Duration>,

    /// Ramp-up period (supports ms/s/m/h)
    #[arg(long = "ramp", value_parser = parse_duration_arg)]
    pub ramp: Option<Duration>,

    /// Issue requests at a fixed rate per second instead of closed-loop
    #[arg(long = "rate", value_parser = parse_positive_u64, conflicts_with = "round_size")]
    pub rate: Option<PositiveU64>,

    /// Issue requests in batches of this size, waiting for each batch to finish
    #[arg(long = "round-size", value_parser = parse_positive_u64)]
    pub round_size: Option<PositiveU64>,

    /// Pause between batches (supports ms/s/m/h)
    #[arg(long = "round-interval", value_parser = parse_duration_arg)]
    pub round_interval: Option<Duration>,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long = "timeout", value_parser = parse_duration_arg)]
    pub request_timeout: Option<Duration>,

    /// TCP/TLS connect timeout (supports ms/s/m/h)
    #[arg(long = "connect-timeout", default_value = DEFAULT_CONNECT_TIMEOUT, value_parser = parse_duration_arg)]
    pub connect_timeout: Duration,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Maximum redirects to follow (0 disables redirects)
    #[arg(long = "redirect-limit", default_value_t = DEFAULT_REDIRECT_LIMIT)]
    pub redirect_limit: usize,

    /// Outcome buffer size (defaults to 4 slots per worker)
    #[arg(long = "buffer-size", value_parser = parse_positive_usize)]
    pub buffer_size: Option<PositiveUsize>,

    /// Fail the run when recording an outcome blocks longer than this
    #[arg(long = "backpressure-timeout", value_parser = parse_duration_arg)]
    pub backpressure_timeout: Option<Duration>,

    /// How long in-flight requests may finish after a stop
    #[arg(long = "drain-grace", value_parser = parse_duration_arg)]
    pub drain_grace: Option<Duration>,

    /// Worker faults tolerated before the run fails
    #[arg(long = "fault-budget")]
    pub fault_budget: Option<usize>,

    /// Interval between progress snapshots (supports ms/s/m/h)
    #[arg(long = "snapshot-interval", value_parser = parse_duration_arg)]
    pub snapshot_interval: Option<Duration>,

    /// Width of the sliding throughput window in seconds
    #[arg(long = "throughput-window", value_parser = parse_positive_u64)]
    pub throughput_window: Option<PositiveU64>,

    /// Append every snapshot as one JSON line to this file
    #[arg(long = "snapshot-out")]
    pub snapshot_out: Option<String>,

    /// Send one request before the run and abort if it fails
    #[arg(long)]
    pub preflight: bool,

    /// Path to a TOML or JSON config file
    #[arg(long)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}
