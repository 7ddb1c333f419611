use std::time::{Duration, Instant};

/// Timing half of the delayed reference frame.
///
/// The reference is refreshed at most once per `interval`, regardless of how
/// often ticks arrive. A buffer that has never been refreshed is always due.
#[derive(Debug, Clone)]
pub struct DelayBuffer {
    interval: Duration,
    last_refresh: Option<Instant>,
}

impl DelayBuffer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_refresh: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Takes effect on the next `is_due` comparison.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn last_refresh(&self) -> Option<Instant> {
        self.last_refresh
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark_refreshed(&mut self, now: Instant) {
        self.last_refresh = Some(now);
    }

    /// Forgets the last refresh so the next tick captures a new reference.
    pub fn reset(&mut self) {
        self.last_refresh = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_buffer_is_due() {
        let buffer = DelayBuffer::new(Duration::from_secs(1));
        assert!(buffer.is_due(Instant::now()));
    }

    #[test]
    fn due_exactly_at_interval() {
        let start = Instant::now();
        let mut buffer = DelayBuffer::new(Duration::from_millis(100));
        buffer.mark_refreshed(start);
        assert!(!buffer.is_due(start + Duration::from_millis(99)));
        assert!(buffer.is_due(start + Duration::from_millis(100)));
    }

    #[test]
    fn interval_change_applies_to_next_comparison() {
        let start = Instant::now();
        let mut buffer = DelayBuffer::new(Duration::from_secs(10));
        buffer.mark_refreshed(start);
        let probe = start + Duration::from_millis(500);
        assert!(!buffer.is_due(probe));
        buffer.set_interval(Duration::from_millis(200));
        assert!(buffer.is_due(probe));
    }

    #[test]
    fn zero_interval_is_always_due() {
        let start = Instant::now();
        let mut buffer = DelayBuffer::new(Duration::ZERO);
        buffer.mark_refreshed(start);
        assert!(buffer.is_due(start));
    }

    #[test]
    fn reset_makes_buffer_due() {
        let start = Instant::now();
        let mut buffer = DelayBuffer::new(Duration::from_secs(60));
        buffer.mark_refreshed(start);
        buffer.reset();
        assert!(buffer.is_due(start));
        assert_eq!(buffer.last_refresh(), None);
    }
}
