use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latency distribution in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_us: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Counts per outcome class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub target_failures: u64,
    pub assertion_failures: u64,
    pub scenario_failures: u64,
    pub timeouts: u64,
    pub cancelled: u64,
}

impl OutcomeCounts {
    /// Failures plus timeouts.
    #[must_use]
    pub const fn errors(&self) -> u64 {
        self.failure.saturating_add(self.timeouts)
    }
}

/// Consistent point-in-time view of the aggregated statistics. Every field
/// reflects the same set of ingested outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub counts: OutcomeCounts,
    /// Success and failure outcomes.
    pub latency: LatencySummary,
    pub success_latency: LatencySummary,
    pub window_secs: u64,
    pub window_rps: u64,
    pub mean_rps: u64,
    /// Failures plus timeouts per ten thousand outcomes.
    pub error_rate_bp: u64,
    pub status_counts: BTreeMap<u16, u64>,
    pub last_error: Option<String>,
}

impl StatsSnapshot {
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.counts.total
    }

    #[must_use]
    pub const fn errors(&self) -> u64 {
        self.counts.errors()
    }

    /// Error rate formatted as a percentage with two decimals.
    #[must_use]
    pub fn error_rate_display(&self) -> String {
        let whole = self.error_rate_bp.checked_div(100).unwrap_or(0);
        let frac = self.error_rate_bp.checked_rem(100).unwrap_or(0);
        format!("{}.{:02}%", whole, frac)
    }
}
