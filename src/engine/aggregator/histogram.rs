use std::time::Duration;

use hdrhistogram::Histogram;

use crate::error::EngineError;

use super::snapshot::LatencySummary;

/// Upper bound tracked at full precision: one hour, in microseconds. Larger
/// samples are clamped so memory stays fixed for any run length.
const MAX_TRACKABLE_US: u64 = 3_600_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
    sum_us: u128,
}

impl LatencyHistogram {
    /// Create an empty histogram with fixed bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> Result<Self, EngineError> {
        let hist = Histogram::<u64>::new_with_bounds(1, MAX_TRACKABLE_US, SIGNIFICANT_FIGURES)
            .map_err(|source| EngineError::HistogramCreation { source })?;
        Ok(Self { hist, sum_us: 0 })
    }

    /// Record one latency sample.
    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        let value = micros.clamp(1, MAX_TRACKABLE_US);
        self.hist.saturating_record(value);
        self.sum_us = self.sum_us.saturating_add(u128::from(value));
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    /// Value at `quantile` in microseconds, zero when empty.
    #[must_use]
    pub fn quantile_us(&self, quantile: f64) -> u64 {
        if self.count() == 0 {
            return 0;
        }
        self.hist.value_at_quantile(quantile)
    }

    #[must_use]
    pub fn summary(&self) -> LatencySummary {
        let count = self.count();
        if count == 0 {
            return LatencySummary::default();
        }
        let mean = self
            .sum_us
            .checked_div(u128::from(count))
            .and_then(|mean| u64::try_from(mean).ok())
            .unwrap_or(0);
        LatencySummary {
            count,
            min_us: self.hist.min(),
            mean_us: mean,
            p50_us: self.hist.value_at_quantile(0.5),
            p90_us: self.hist.value_at_quantile(0.9),
            p95_us: self.hist.value_at_quantile(0.95),
            p99_us: self.hist.value_at_quantile(0.99),
            max_us: self.hist.max(),
        }
    }
}
