use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

/// Refill period of the rate limiter.
pub(crate) const RATE_TICK: Duration = Duration::from_millis(100);
const TICKS_PER_SEC: u64 = 10;

/// Converts a requests-per-second target (optionally ramped from zero) into
/// per-tick token grants. Fractional tokens carry over between ticks.
#[derive(Debug, Clone)]
pub(crate) struct RateController {
    target_per_sec: u64,
    ramp_ticks: u64,
    tick: u64,
    remainder: u64,
}

impl RateController {
    pub(crate) fn new(target_per_sec: u64, ramp: Duration) -> Self {
        let ramp_ticks = ramp
            .as_millis()
            .checked_div(RATE_TICK.as_millis())
            .unwrap_or(0);
        Self {
            target_per_sec,
            ramp_ticks: u64::try_from(ramp_ticks).unwrap_or(u64::MAX),
            tick: 0,
            remainder: 0,
        }
    }

    /// Rate in effect for the tick about to be granted.
    pub(crate) fn current_rate(&self) -> u64 {
        let progressed = self.tick.saturating_add(1);
        if self.ramp_ticks == 0 || progressed >= self.ramp_ticks {
            return self.target_per_sec;
        }
        let scaled = u128::from(self.target_per_sec)
            .saturating_mul(u128::from(progressed))
            .checked_div(u128::from(self.ramp_ticks))
            .unwrap_or(0);
        u64::try_from(scaled).unwrap_or(self.target_per_sec)
    }

    pub(crate) fn next_tokens(&mut self) -> usize {
        let rate = self.current_rate();
        let (base, rem) = div_mod_u64(rate, TICKS_PER_SEC);
        let (carry, new_rem) = div_mod_u64(self.remainder.saturating_add(rem), TICKS_PER_SEC);
        self.remainder = new_rem;
        self.tick = self.tick.saturating_add(1);
        let tokens = base.saturating_add(carry);
        usize::try_from(tokens)
            .unwrap_or(usize::MAX)
            .min(Semaphore::MAX_PERMITS)
    }
}

/// Spawns the task that refills `limiter` every [`RATE_TICK`]. Unused tokens do
/// not accumulate past one tick's grant. The limiter is closed once `stop`
/// fires so blocked callers wake up.
pub(crate) fn spawn_rate_pacer(
    limiter: Arc<Semaphore>,
    mut controller: RateController,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rate_tick = interval(RATE_TICK);
        rate_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = rate_tick.tick() => {
                    let target = controller.next_tokens();
                    let available = limiter.available_permits();
                    if available < target {
                        limiter.add_permits(target.saturating_sub(available));
                    }
                }
            }
        }
        limiter.close();
    })
}

fn div_mod_u64(value: u64, divisor: u64) -> (u64, u64) {
    if divisor == 0 {
        return (0, 0);
    }
    let div = value.checked_div(divisor).unwrap_or(0);
    let rem = value.checked_rem(divisor).unwrap_or(0);
    (div, rem)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_tokens(controller: &mut RateController, ticks: u64) -> usize {
        let mut total = 0usize;
        for _ in 0..ticks {
            total = total.saturating_add(controller.next_tokens());
        }
        total
    }

    #[test]
    fn fixed_rate_spreads_tokens_across_a_second() -> Result<(), String> {
        let mut controller = RateController::new(25, Duration::ZERO);
        let first = controller.next_tokens();
        if first != 2 {
            return Err(format!("Unexpected first tick grant: {}", first));
        }
        let rest = sum_tokens(&mut controller, 9);
        let total = first.saturating_add(rest);
        if total != 25 {
            return Err(format!("Expected 25 tokens per second, got {}", total));
        }
        Ok(())
    }

    #[test]
    fn low_rate_carries_remainder() -> Result<(), String> {
        let mut controller = RateController::new(3, Duration::ZERO);
        let total = sum_tokens(&mut controller, 20);
        if total != 6 {
            return Err(format!("Expected 6 tokens over two seconds, got {}", total));
        }
        Ok(())
    }

    #[test]
    fn ramp_grows_rate_linearly() -> Result<(), String> {
        let mut controller = RateController::new(100, Duration::from_secs(1));
        let start = controller.current_rate();
        if start != 10 {
            return Err(format!("Unexpected starting rate: {}", start));
        }
        sum_tokens(&mut controller, 4);
        let mid = controller.current_rate();
        if mid != 50 {
            return Err(format!("Unexpected mid-ramp rate: {}", mid));
        }
        sum_tokens(&mut controller, 10);
        let end = controller.current_rate();
        if end != 100 {
            return Err(format!("Unexpected post-ramp rate: {}", end));
        }
        Ok(())
    }
}
