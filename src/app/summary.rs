use crate::engine::{LatencySummary, RunReport};

/// Microseconds per millisecond.
const US_PER_MS: u64 = 1_000;
/// Basis points per percent.
const BP_PER_PERCENT: u64 = 100;

pub(crate) fn summary_lines(report: &RunReport) -> Vec<String> {
    let snapshot = &report.snapshot;
    let counts = &snapshot.counts;
    let mut lines = Vec::new();

    lines.push(format!("State: {}", report.state));
    if let Some(fault) = report.fault.as_ref() {
        lines.push(format!("Fault: {}", fault));
    }
    if let Some(reason) = report.drain_reason {
        lines.push(format!("Stopped by: {}", reason.as_str()));
    }
    lines.push(format!("Duration: {}", format_ms(snapshot.elapsed_ms)));
    lines.push(format!("Total Requests: {}", counts.total));

    let success_bp = ratio_bp(counts.success, counts.total);
    lines.push(format!(
        "Successful: {} ({})",
        counts.success,
        format_bp(success_bp)
    ));
    lines.push(format!(
        "Failed: {} (target {}, assertion {}, scenario {})",
        counts.failure, counts.target_failures, counts.assertion_failures, counts.scenario_failures
    ));
    lines.push(format!("Timeouts: {}", counts.timeouts));
    lines.push(format!("Cancelled: {}", counts.cancelled));
    lines.push(format!("Error Rate: {}", snapshot.error_rate_display()));
    lines.push(latency_line("Latency (all)", &snapshot.latency));
    lines.push(latency_line("Latency (ok)", &snapshot.success_latency));
    lines.push(format!(
        "Throughput: {} req/s (last {}s: {} req/s)",
        snapshot.mean_rps, snapshot.window_secs, snapshot.window_rps
    ));
    if !snapshot.status_counts.is_empty() {
        let statuses: Vec<String> = snapshot
            .status_counts
            .iter()
            .map(|(status, count)| format!("{}={}", status, count))
            .collect();
        lines.push(format!("Status Codes: {}", statuses.join(" ")));
    }
    if report.pool.faults > 0 {
        lines.push(format!(
            "Worker Faults: {} (replaced {})",
            report.pool.faults, report.pool.replaced
        ));
    }
    if let Some(error) = snapshot.last_error.as_ref() {
        lines.push(format!("Last Error: {}", error));
    }

    lines
}

pub(crate) fn print_summary(report: &RunReport) {
    for line in summary_lines(report) {
        println!("{}", line);
    }
}

fn latency_line(label: &str, latency: &LatencySummary) -> String {
    if latency.count == 0 {
        return format!("{}: n/a", label);
    }
    format!(
        "{}: min {} / mean {} / p50 {} / p90 {} / p95 {} / p99 {} / max {}",
        label,
        format_us(latency.min_us),
        format_us(latency.mean_us),
        format_us(latency.p50_us),
        format_us(latency.p90_us),
        format_us(latency.p95_us),
        format_us(latency.p99_us),
        format_us(latency.max_us)
    )
}

fn ratio_bp(part: u64, total: u64) -> u64 {
    let scaled = u128::from(part)
        .saturating_mul(10_000)
        .checked_div(u128::from(total))
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

fn format_bp(bp: u64) -> String {
    format!(
        "{}.{:02}%",
        bp.checked_div(BP_PER_PERCENT).unwrap_or(0),
        bp.checked_rem(BP_PER_PERCENT).unwrap_or(0)
    )
}

/// Milliseconds with three decimals, e.g. `12.345ms`.
fn format_us(us: u64) -> String {
    format!(
        "{}.{:03}ms",
        us.checked_div(US_PER_MS).unwrap_or(0),
        us.checked_rem(US_PER_MS).unwrap_or(0)
    )
}

fn format_ms(ms: u64) -> String {
    format!(
        "{}.{:03}s",
        ms.checked_div(1_000).unwrap_or(0),
        ms.checked_rem(1_000).unwrap_or(0)
    )
}
