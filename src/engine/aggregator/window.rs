use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    second: u64,
    count: u64,
}

/// Rolling count of outcomes per whole second since the run started.
///
/// Holds `window_secs + 1` buckets so the second in progress never evicts the
/// oldest complete one.
#[derive(Debug, Clone)]
pub struct ThroughputWindow {
    origin: Instant,
    window_secs: u64,
    buckets: Vec<Option<Bucket>>,
}

impl ThroughputWindow {
    #[must_use]
    pub fn new(origin: Instant, window_secs: u64) -> Self {
        let window_secs = window_secs.max(1);
        let slots = usize::try_from(window_secs.saturating_add(1)).unwrap_or(usize::MAX);
        Self {
            origin,
            window_secs,
            buckets: vec![None; slots],
        }
    }

    #[must_use]
    pub const fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Count one outcome that finished at `at`. Outcomes older than every
    /// bucket are ignored.
    pub fn record(&mut self, at: Instant) {
        let second = at.saturating_duration_since(self.origin).as_secs();
        let Some(slot) = self.slot_mut(second) else {
            return;
        };
        match slot {
            Some(bucket) if bucket.second == second => {
                bucket.count = bucket.count.saturating_add(1);
            }
            Some(bucket) if bucket.second > second => {}
            Some(_) | None => *slot = Some(Bucket { second, count: 1 }),
        }
    }

    /// Outcomes per second over the complete seconds in the window ending at
    /// `now`. During the first second the partial second is used instead.
    #[must_use]
    pub fn rate_per_sec(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.origin);
        let now_sec = elapsed.as_secs();
        if now_sec == 0 {
            let count = self.count_between(0, 0);
            let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX).max(1);
            return count
                .saturating_mul(1_000)
                .checked_div(millis)
                .unwrap_or(0);
        }
        let first = now_sec.saturating_sub(self.window_secs);
        let last = now_sec.saturating_sub(1);
        let span = now_sec.saturating_sub(first).max(1);
        self.count_between(first, last)
            .checked_div(span)
            .unwrap_or(0)
    }

    fn count_between(&self, first: u64, last: u64) -> u64 {
        self.buckets
            .iter()
            .flatten()
            .filter(|bucket| bucket.second >= first && bucket.second <= last)
            .fold(0u64, |total, bucket| total.saturating_add(bucket.count))
    }

    fn slot_mut(&mut self, second: u64) -> Option<&mut Option<Bucket>> {
        let slots = u64::try_from(self.buckets.len()).ok()?;
        let index = usize::try_from(second.checked_rem(slots)?).ok()?;
        self.buckets.get_mut(index)
    }
}
