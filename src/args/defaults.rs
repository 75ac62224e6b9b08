use std::time::Duration;

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("loadpulse/", env!("CARGO_PKG_VERSION"));

/// Config files picked up from the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILES: [&str; 2] = ["loadpulse.toml", "loadpulse.json"];

pub(super) const DEFAULT_CONCURRENCY: &str = "100";
pub(super) const DEFAULT_EXPECTED_STATUS: u16 = 200;
pub(super) const DEFAULT_CONNECT_TIMEOUT: &str = "5s";
pub(super) const DEFAULT_REDIRECT_LIMIT: usize = 10;

/// Pause between rounds when `--round-size` is given without `--round-interval`.
pub(crate) const DEFAULT_ROUND_INTERVAL: Duration = Duration::from_secs(5);
