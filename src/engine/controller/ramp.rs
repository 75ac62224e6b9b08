use std::time::Duration;

/// How often the ramp widens the worker gate.
pub(crate) const RAMP_TICK: Duration = Duration::from_millis(100);

/// Linear concurrency ramp from one worker to `target` over `ramp`.
#[derive(Debug, Clone)]
pub(crate) struct ConcurrencyRamp {
    target: usize,
    ramp: Duration,
    granted: usize,
}

impl ConcurrencyRamp {
    pub(crate) const fn new(target: usize, ramp: Duration) -> Self {
        Self {
            target,
            ramp,
            granted: 0,
        }
    }

    pub(crate) const fn is_active(&self) -> bool {
        !self.ramp.is_zero() && self.target > 1
    }

    /// Workers allowed `elapsed` into the ramp.
    pub(crate) fn desired_at(&self, elapsed: Duration) -> usize {
        if !self.is_active() || elapsed >= self.ramp {
            return self.target;
        }
        let scaled = u128::try_from(self.target)
            .unwrap_or(u128::MAX)
            .saturating_mul(elapsed.as_millis())
            .checked_div(self.ramp.as_millis().max(1))
            .unwrap_or(0);
        usize::try_from(scaled)
            .unwrap_or(self.target)
            .clamp(1, self.target)
    }

    /// Permits to add so the gate matches `elapsed`. Never shrinks.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> usize {
        let desired = self.desired_at(elapsed);
        let add = desired.saturating_sub(self.granted);
        self.granted = self.granted.max(desired);
        add
    }

    /// Permits still missing to reach the full target.
    pub(crate) fn finish(&mut self) -> usize {
        let add = self.target.saturating_sub(self.granted);
        self.granted = self.target;
        add
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_starts_at_one_and_reaches_target() -> Result<(), String> {
        let mut ramp = ConcurrencyRamp::new(10, Duration::from_secs(1));
        let first = ramp.advance(Duration::ZERO);
        if first != 1 {
            return Err(format!("Expected one worker at start, got {}", first));
        }
        let half = ramp.advance(Duration::from_millis(500));
        if half != 4 {
            return Err(format!("Expected 4 more workers at half ramp, got {}", half));
        }
        let rest = ramp.finish();
        if rest != 5 {
            return Err(format!("Expected 5 remaining workers, got {}", rest));
        }
        if ramp.advance(Duration::from_secs(2)) != 0 {
            return Err("Ramp granted past target".to_owned());
        }
        Ok(())
    }

    #[test]
    fn no_ramp_grants_everything() -> Result<(), String> {
        let mut ramp = ConcurrencyRamp::new(7, Duration::ZERO);
        if ramp.is_active() {
            return Err("Zero ramp must be inactive".to_owned());
        }
        let granted = ramp.advance(Duration::ZERO);
        if granted != 7 {
            return Err(format!("Expected 7 workers, got {}", granted));
        }
        Ok(())
    }
}
