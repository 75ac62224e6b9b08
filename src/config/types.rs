use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, parse_duration_value};
use crate::error::ConfigError;

/// Every field is optional; unset fields leave the CLI value untouched.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub urls: Option<Vec<String>>,
    pub urls_file: Option<String>,
    pub method: Option<HttpMethod>,
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    #[serde(alias = "status")]
    pub expected_status: Option<u16>,
    pub body_contains: Option<String>,
    pub concurrency: Option<usize>,
    pub requests: Option<u64>,
    pub duration: Option<DurationValue>,
    pub ramp: Option<DurationValue>,
    pub rate: Option<u64>,
    pub round_size: Option<u64>,
    pub round_interval: Option<DurationValue>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub insecure: Option<bool>,
    pub redirect_limit: Option<usize>,
    pub buffer_size: Option<usize>,
    pub backpressure_timeout: Option<DurationValue>,
    pub drain_grace: Option<DurationValue>,
    pub fault_budget: Option<usize>,
    pub snapshot_interval: Option<DurationValue>,
    pub throughput_window: Option<u64>,
    pub snapshot_out: Option<String>,
    pub preflight: Option<bool>,
}

/// `30` (seconds) or `"250ms"` style text.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self, field: &'static str) -> Result<Duration, ConfigError> {
        match self {
            DurationValue::Seconds(0) => Err(ConfigError::ZeroDuration { field }),
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration_value(text)
                .map_err(|err| ConfigError::InvalidDuration { field, source: err }),
        }
    }
}
