use std::time::Duration;

use crate::error::ConfigError;

/// Outcome buffer slots reserved per worker when no buffer size is given.
pub const DEFAULT_BUFFER_PER_WORKER: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BACKPRESSURE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_THROUGHPUT_WINDOW_SECS: u64 = 10;
pub const MAX_THROUGHPUT_WINDOW_SECS: u64 = 3_600;
/// Worker faults tolerated before the run is failed.
pub const DEFAULT_FAULT_BUDGET: usize = 3;

/// How request issuance is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Closed loop: every active worker issues its next request as soon as
    /// the previous one completes.
    Concurrency,
    /// Open loop: issuance is paced to `per_second`, with at most
    /// `concurrency` requests in flight.
    Rate { per_second: u64 },
    /// Batches of `size` requests; a batch starts only after the previous one
    /// completed and `interval` has passed.
    Rounds { size: u64, interval: Duration },
}

impl LoadMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LoadMode::Concurrency => "concurrency",
            LoadMode::Rate { .. } => "rate",
            LoadMode::Rounds { .. } => "rounds",
        }
    }
}

/// Validated, immutable description of one run.
#[derive(Debug, Clone)]
pub struct LoadProfile {
    mode: LoadMode,
    concurrency: usize,
    ramp: Duration,
    steady: Option<Duration>,
    request_cap: Option<u64>,
    request_timeout: Duration,
    buffer_size: usize,
    backpressure_timeout: Duration,
    drain_grace: Duration,
    fault_budget: usize,
    snapshot_interval: Duration,
    throughput_window_secs: u64,
}

impl LoadProfile {
    #[must_use]
    pub const fn builder(concurrency: usize) -> LoadProfileBuilder {
        LoadProfileBuilder {
            mode: LoadMode::Concurrency,
            concurrency,
            ramp: Duration::ZERO,
            steady: None,
            request_cap: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            buffer_size: None,
            backpressure_timeout: DEFAULT_BACKPRESSURE_TIMEOUT,
            drain_grace: DEFAULT_DRAIN_GRACE,
            fault_budget: DEFAULT_FAULT_BUDGET,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            throughput_window_secs: DEFAULT_THROUGHPUT_WINDOW_SECS,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> LoadMode {
        self.mode
    }

    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[must_use]
    pub const fn ramp(&self) -> Duration {
        self.ramp
    }

    #[must_use]
    pub const fn steady(&self) -> Option<Duration> {
        self.steady
    }

    #[must_use]
    pub const fn request_cap(&self) -> Option<u64> {
        self.request_cap
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    #[must_use]
    pub const fn backpressure_timeout(&self) -> Duration {
        self.backpressure_timeout
    }

    #[must_use]
    pub const fn drain_grace(&self) -> Duration {
        self.drain_grace
    }

    #[must_use]
    pub const fn fault_budget(&self) -> usize {
        self.fault_budget
    }

    #[must_use]
    pub const fn snapshot_interval(&self) -> Duration {
        self.snapshot_interval
    }

    #[must_use]
    pub const fn throughput_window_secs(&self) -> u64 {
        self.throughput_window_secs
    }

    /// Ramp plus steady duration, or `None` when only the request cap bounds
    /// the run.
    #[must_use]
    pub fn total_duration(&self) -> Option<Duration> {
        self.steady.map(|steady| self.ramp.saturating_add(steady))
    }
}

#[derive(Debug, Clone)]
pub struct LoadProfileBuilder {
    mode: LoadMode,
    concurrency: usize,
    ramp: Duration,
    steady: Option<Duration>,
    request_cap: Option<u64>,
    request_timeout: Duration,
    buffer_size: Option<usize>,
    backpressure_timeout: Duration,
    drain_grace: Duration,
    fault_budget: usize,
    snapshot_interval: Duration,
    throughput_window_secs: u64,
}

impl LoadProfileBuilder {
    #[must_use]
    pub const fn mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn ramp(mut self, ramp: Duration) -> Self {
        self.ramp = ramp;
        self
    }

    #[must_use]
    pub const fn steady(mut self, steady: Option<Duration>) -> Self {
        self.steady = steady;
        self
    }

    #[must_use]
    pub const fn request_cap(mut self, cap: Option<u64>) -> Self {
        self.request_cap = cap;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn buffer_size(mut self, size: Option<usize>) -> Self {
        self.buffer_size = size;
        self
    }

    #[must_use]
    pub const fn backpressure_timeout(mut self, timeout: Duration) -> Self {
        self.backpressure_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    #[must_use]
    pub const fn fault_budget(mut self, budget: usize) -> Self {
        self.fault_budget = budget;
        self
    }

    #[must_use]
    pub const fn snapshot_interval(mut self, interval: Duration) -> Self {
        self.snapshot_interval = interval;
        self
    }

    #[must_use]
    pub const fn throughput_window_secs(mut self, secs: u64) -> Self {
        self.throughput_window_secs = secs;
        self
    }

    /// Validates the settings and freezes them into a [`LoadProfile`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when concurrency is zero, when neither a
    /// request cap nor a steady duration bounds the run, or when a mode,
    /// buffer, or timing value is out of range.
    pub fn build(self) -> Result<LoadProfile, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ConcurrencyZero);
        }
        if self.request_cap.is_none() && self.steady.is_none() {
            return Err(ConfigError::UnboundedProfile);
        }
        match self.mode {
            LoadMode::Concurrency => {}
            LoadMode::Rate { per_second } => {
                if per_second == 0 {
                    return Err(ConfigError::RateZero);
                }
            }
            LoadMode::Rounds { size, .. } => {
                if size == 0 {
                    return Err(ConfigError::RoundSizeZero);
                }
            }
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "request timeout",
            });
        }
        if self.backpressure_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "backpressure timeout",
            });
        }
        if self.snapshot_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "snapshot interval",
            });
        }
        if self.throughput_window_secs == 0
            || self.throughput_window_secs > MAX_THROUGHPUT_WINDOW_SECS
        {
            return Err(ConfigError::InvalidThroughputWindow {
                max: MAX_THROUGHPUT_WINDOW_SECS,
            });
        }
        let buffer_size = match self.buffer_size {
            Some(0) => return Err(ConfigError::BufferZero),
            Some(size) => size,
            None => self.concurrency.saturating_mul(DEFAULT_BUFFER_PER_WORKER),
        };

        Ok(LoadProfile {
            mode: self.mode,
            concurrency: self.concurrency,
            ramp: self.ramp,
            steady: self.steady,
            request_cap: self.request_cap,
            request_timeout: self.request_timeout,
            buffer_size,
            backpressure_timeout: self.backpressure_timeout,
            drain_grace: self.drain_grace,
            fault_budget: self.fault_budget,
            snapshot_interval: self.snapshot_interval,
            throughput_window_secs: self.throughput_window_secs,
        })
    }
}
