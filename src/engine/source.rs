use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ScenarioError;

use super::descriptor::RequestDescriptor;
use super::target::Scenario;

/// What the source hands a worker.
#[derive(Debug)]
pub enum SourceItem {
    Request(RequestDescriptor),
    /// The source is finished. Every later call returns this too.
    EndOfStream,
}

/// Assigns sequence numbers under an optional cap. Reservation is a single
/// compare-and-swap, so concurrent callers never overshoot the cap.
#[derive(Debug)]
pub(crate) struct RequestLimiter {
    limit: Option<u64>,
    counter: AtomicU64,
}

impl RequestLimiter {
    pub(crate) const fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            counter: AtomicU64::new(0),
        }
    }

    /// Reserves the next sequence number, or `None` once the cap is reached.
    pub(crate) fn try_reserve(&self) -> Option<u64> {
        loop {
            let current = self.counter.load(Ordering::Relaxed);
            if let Some(limit) = self.limit
                && current >= limit
            {
                return None;
            }
            let next = current.checked_add(1)?;
            if self
                .counter
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(current);
            }
        }
    }

    pub(crate) fn reserved(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.reserved() >= limit)
    }
}

/// Barrier between rounds: sequence numbers of round `r` are released once
/// `r * size` outcomes were recorded and `interval` has passed since then.
#[derive(Debug)]
pub(crate) struct RoundGate {
    size: u64,
    interval: Duration,
    completed: AtomicU64,
    round_done: Notify,
    last_round: Mutex<(u64, Instant)>,
}

impl RoundGate {
    pub(crate) fn new(size: u64, interval: Duration) -> Self {
        Self {
            size: size.max(1),
            interval,
            completed: AtomicU64::new(0),
            round_done: Notify::new(),
            last_round: Mutex::new((0, Instant::now())),
        }
    }

    pub(crate) fn record_completion(&self) {
        let done = self
            .completed
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1);
        if done.checked_rem(self.size) == Some(0) {
            let round = done.checked_div(self.size).unwrap_or(0);
            let mut last = self
                .last_round
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if round > last.0 {
                let now = Instant::now();
                debug!(
                    round,
                    size = self.size,
                    since_previous_ms = now.saturating_duration_since(last.1).as_millis(),
                    next_in_ms = self.interval.as_millis(),
                    "Round completed"
                );
                *last = (round, now);
            }
            drop(last);
            self.round_done.notify_waiters();
        }
    }

    /// Waits until `seq` may be issued. Returns `false` if `stop` fired first.
    pub(crate) async fn wait_turn(&self, seq: u64, stop: &CancellationToken) -> bool {
        let round = seq.checked_div(self.size).unwrap_or(0);
        if round == 0 {
            return true;
        }
        let needed = round.saturating_mul(self.size);
        loop {
            let notified = self.round_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.completed.load(Ordering::Acquire) >= needed {
                break;
            }
            tokio::select! {
                () = stop.cancelled() => return false,
                () = notified => {}
            }
        }
        let ready_at = self.ready_at(round);
        tokio::select! {
            () = stop.cancelled() => false,
            () = sleep_until(ready_at) => true,
        }
    }

    fn ready_at(&self, round: u64) -> Instant {
        let last = self
            .last_round
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let base = if last.0 >= round { last.1 } else { Instant::now() };
        base.checked_add(self.interval).unwrap_or(base)
    }
}

#[derive(Debug)]
enum Pacing {
    Unpaced,
    Rate(Arc<Semaphore>),
    Rounds(RoundGate),
}

/// Shared, thread-safe supplier of request descriptors.
///
/// Sequence numbers are unique and dense from zero. Once the source reports
/// [`SourceItem::EndOfStream`] it never produces another request.
pub struct RequestSource {
    scenario: Arc<dyn Scenario>,
    limiter: RequestLimiter,
    stop: CancellationToken,
    pacing: Pacing,
}

impl RequestSource {
    /// Source issuing as fast as workers ask.
    #[must_use]
    pub fn new(
        scenario: Arc<dyn Scenario>,
        request_cap: Option<u64>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            scenario,
            limiter: RequestLimiter::new(request_cap),
            stop,
            pacing: Pacing::Unpaced,
        }
    }

    /// Each issued request consumes one permit from `limiter`. A closed
    /// limiter ends the stream.
    #[must_use]
    pub(crate) fn with_rate_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.pacing = Pacing::Rate(limiter);
        self
    }

    #[must_use]
    pub(crate) fn with_rounds(mut self, size: u64, interval: Duration) -> Self {
        self.pacing = Pacing::Rounds(RoundGate::new(size, interval));
        self
    }

    /// Produces the next descriptor, waiting for pacing when configured.
    ///
    /// # Errors
    ///
    /// Returns the scenario's error when it fails to build the descriptor for
    /// the reserved sequence number. The sequence number stays consumed.
    pub async fn next(&self) -> Result<SourceItem, ScenarioError> {
        if self.stop.is_cancelled() || self.limiter.exhausted() {
            return Ok(SourceItem::EndOfStream);
        }
        if let Pacing::Rate(limiter) = &self.pacing {
            let permit = tokio::select! {
                biased;
                () = self.stop.cancelled() => return Ok(SourceItem::EndOfStream),
                permit = limiter.acquire() => permit,
            };
            match permit {
                Ok(permit) => permit.forget(),
                Err(_) => return Ok(SourceItem::EndOfStream),
            }
        }
        let reserved = self.limiter.try_reserve();
        if let Pacing::Rate(limiter) = &self.pacing
            && self.limiter.exhausted()
        {
            // Wakes workers parked on the limiter; the cap is spent.
            limiter.close();
        }
        let Some(seq) = reserved else {
            return Ok(SourceItem::EndOfStream);
        };
        if let Pacing::Rounds(gate) = &self.pacing
            && !gate.wait_turn(seq, &self.stop).await
        {
            return Ok(SourceItem::EndOfStream);
        }
        self.scenario.build_request(seq).map(SourceItem::Request)
    }

    /// Called once per recorded outcome; drives the round barrier.
    pub fn record_completion(&self) {
        if let Pacing::Rounds(gate) = &self.pacing {
            gate.record_completion();
        }
    }

    /// Sequence numbers handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.limiter.reserved()
    }

    /// Whether the request cap has been fully reserved.
    #[must_use]
    pub fn cap_reached(&self) -> bool {
        self.limiter.exhausted()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::args::HttpMethod;
    use crate::error::AppResult;

    struct Numbered;

    impl Scenario for Numbered {
        fn name(&self) -> &str {
            "numbered"
        }

        fn build_request(&self, seq: u64) -> Result<RequestDescriptor, ScenarioError> {
            if seq == 3 {
                return Err(ScenarioError::Build {
                    seq,
                    message: "no template".to_owned(),
                });
            }
            Ok(RequestDescriptor::new(
                seq,
                HttpMethod::Get,
                format!("http://localhost/{}", seq),
            ))
        }
    }

    fn run_async_test<F>(future: F) -> AppResult<()>
    where
        F: std::future::Future<Output = AppResult<()>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(future)
    }

    #[test]
    fn limiter_never_exceeds_cap_across_threads() -> AppResult<()> {
        let limiter = Arc::new(RequestLimiter::new(Some(1_000)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(seq) = limiter.try_reserve() {
                    seen.push(seq);
                }
                seen
            }));
        }
        let mut all = HashSet::new();
        for handle in handles {
            let seen = handle
                .join()
                .map_err(|panic| {
                    crate::error::AppError::validation(format!("reserve thread panicked: {:?}", panic))
                })?;
            for seq in seen {
                if !all.insert(seq) {
                    return Err(crate::error::AppError::validation(format!(
                        "Duplicate sequence number {}",
                        seq
                    )));
                }
            }
        }
        if all.len() != 1_000 || all.iter().max() != Some(&999) {
            return Err(crate::error::AppError::validation(format!(
                "Expected dense sequence numbers 0..1000, got {}",
                all.len()
            )));
        }
        Ok(())
    }

    #[test]
    fn source_ends_after_cap_and_stays_ended() -> AppResult<()> {
        run_async_test(async {
            let source = RequestSource::new(Arc::new(Numbered), Some(3), CancellationToken::new());
            for expected in 0..3 {
                match source.next().await {
                    Ok(SourceItem::Request(descriptor)) if descriptor.seq() == expected => {}
                    other => {
                        return Err(crate::error::AppError::validation(format!(
                            "Unexpected item for seq {}: {:?}",
                            expected, other
                        )));
                    }
                }
            }
            for _ in 0..2 {
                if !matches!(source.next().await, Ok(SourceItem::EndOfStream)) {
                    return Err(crate::error::AppError::validation(
                        "Expected end of stream after cap",
                    ));
                }
            }
            Ok(())
        })
    }

    #[test]
    fn scenario_error_consumes_sequence_number() -> AppResult<()> {
        run_async_test(async {
            let source = RequestSource::new(Arc::new(Numbered), Some(5), CancellationToken::new());
            let mut errors = 0u32;
            let mut requests = 0u32;
            loop {
                match source.next().await {
                    Ok(SourceItem::Request(_)) => requests = requests.saturating_add(1),
                    Ok(SourceItem::EndOfStream) => break,
                    Err(ScenarioError::Build { seq: 3, .. }) => errors = errors.saturating_add(1),
                    Err(err) => {
                        return Err(crate::error::AppError::validation(format!(
                            "Unexpected error: {}",
                            err
                        )));
                    }
                }
            }
            if requests != 4 || errors != 1 || source.issued() != 5 {
                return Err(crate::error::AppError::validation(format!(
                    "Unexpected counts: requests={} errors={} issued={}",
                    requests,
                    errors,
                    source.issued()
                )));
            }
            Ok(())
        })
    }

    #[test]
    fn stop_ends_stream_even_below_cap() -> AppResult<()> {
        run_async_test(async {
            let stop = CancellationToken::new();
            let source = RequestSource::new(Arc::new(Numbered), None, stop.clone());
            if !matches!(source.next().await, Ok(SourceItem::Request(_))) {
                return Err(crate::error::AppError::validation("Expected a request"));
            }
            stop.cancel();
            if !matches!(source.next().await, Ok(SourceItem::EndOfStream)) {
                return Err(crate::error::AppError::validation(
                    "Expected end of stream after stop",
                ));
            }
            Ok(())
        })
    }

    #[test]
    fn closed_rate_limiter_ends_stream() -> AppResult<()> {
        run_async_test(async {
            let limiter = Arc::new(Semaphore::new(1));
            let source = RequestSource::new(Arc::new(Numbered), None, CancellationToken::new())
                .with_rate_limiter(Arc::clone(&limiter));
            if !matches!(source.next().await, Ok(SourceItem::Request(_))) {
                return Err(crate::error::AppError::validation("Expected a paced request"));
            }
            limiter.close();
            if !matches!(source.next().await, Ok(SourceItem::EndOfStream)) {
                return Err(crate::error::AppError::validation(
                    "Expected end of stream after limiter closed",
                ));
            }
            Ok(())
        })
    }

    #[test]
    fn last_reservation_closes_rate_limiter() -> AppResult<()> {
        run_async_test(async {
            let limiter = Arc::new(Semaphore::new(2));
            let source = RequestSource::new(Arc::new(Numbered), Some(2), CancellationToken::new())
                .with_rate_limiter(Arc::clone(&limiter));
            if !matches!(source.next().await, Ok(SourceItem::Request(_))) {
                return Err(crate::error::AppError::validation("Expected a paced request"));
            }
            if limiter.is_closed() {
                return Err(crate::error::AppError::validation(
                    "Limiter closed before the cap was reserved",
                ));
            }
            if !matches!(source.next().await, Ok(SourceItem::Request(_))) {
                return Err(crate::error::AppError::validation("Expected the last request"));
            }
            if !limiter.is_closed() {
                return Err(crate::error::AppError::validation(
                    "Reserving the last slot must close the limiter",
                ));
            }
            Ok(())
        })
    }

    #[test]
    fn second_round_waits_for_first_to_complete() -> AppResult<()> {
        run_async_test(async {
            let source = Arc::new(
                RequestSource::new(Arc::new(Numbered), Some(3), CancellationToken::new())
                    .with_rounds(2, Duration::from_millis(50)),
            );
            for _ in 0..2 {
                if !matches!(source.next().await, Ok(SourceItem::Request(_))) {
                    return Err(crate::error::AppError::validation("Expected first round"));
                }
            }
            let waiting = {
                let source = Arc::clone(&source);
                tokio::spawn(async move {
                    matches!(source.next().await, Ok(SourceItem::Request(descriptor)) if descriptor.seq() == 2)
                })
            };
            tokio::time::sleep(Duration::from_millis(30)).await;
            if waiting.is_finished() {
                return Err(crate::error::AppError::validation(
                    "Second round released before first completed",
                ));
            }
            let completed_at = Instant::now();
            source.record_completion();
            source.record_completion();
            let released = waiting.await?;
            if !released {
                return Err(crate::error::AppError::validation(
                    "Expected seq 2 from the second round",
                ));
            }
            if completed_at.elapsed() < Duration::from_millis(50) {
                return Err(crate::error::AppError::validation(
                    "Round interval was not honoured",
                ));
            }
            Ok(())
        })
    }
}
