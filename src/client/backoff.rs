use std::time::Duration;

/// Default base polling interval.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(2_500);
/// Absolute ceiling of the polling interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(30);
const MAX_MULTIPLIER: u32 = 6;

/// Polling interval that doubles on consecutive failures and snaps back on success.
#[derive(Debug, Clone)]
pub struct AdaptivePoll {
    base: Duration,
    current: Duration,
    failures: u32,
}

impl AdaptivePoll {
    /// Policy polling every `base` while healthy.
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            current: base,
            failures: 0,
        }
    }

    /// Largest interval ever used: `min(6 × base, 30 s)`.
    pub fn ceiling(&self) -> Duration {
        (self.base * MAX_MULTIPLIER).min(MAX_INTERVAL)
    }

    /// Interval to wait before the next poll.
    pub fn interval(&self) -> Duration {
        self.current
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Back to the base interval.
    pub fn on_success(&mut self) {
        self.failures = 0;
        self.current = self.base;
    }

    /// Double the interval up to the ceiling.
    pub fn on_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        self.current = (self.current * 2).min(self.ceiling());
    }
}

impl Default for AdaptivePoll {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_to_six_times_base_then_resets() {
        let mut poll = AdaptivePoll::default();
        let mut seen = Vec::new();
        for _ in 0..4 {
            poll.on_failure();
            seen.push(poll.interval().as_millis());
        }
        assert_eq!(seen, [5_000, 10_000, 15_000, 15_000]);
        assert_eq!(poll.failures(), 4);

        poll.on_success();
        assert_eq!(poll.interval(), DEFAULT_BASE_INTERVAL);
        assert_eq!(poll.failures(), 0);
    }

    #[test]
    fn absolute_ceiling_applies_to_slow_bases() {
        let mut poll = AdaptivePoll::new(Duration::from_secs(10));
        for _ in 0..5 {
            poll.on_failure();
        }
        assert_eq!(poll.interval(), MAX_INTERVAL);
    }
}
