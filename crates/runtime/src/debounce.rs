//! Trailing-edge debounce for bursts of file events.

use std::time::Duration;

use tokio::time::Instant;

/// Collapses a burst of events into one firing, `quiet` after the last event.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
    pending: usize,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
            pending: 0,
        }
    }

    /// Note an event at `now`; pushes the deadline back.
    pub fn record(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
        self.pending += 1;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Events recorded since the last firing.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// `true` once per burst, when `now` has reached the deadline.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending = 0;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(500);

    #[test]
    fn idle_never_fires() {
        let mut debouncer = Debouncer::new(QUIET);
        assert!(debouncer.deadline().is_none());
        assert!(!debouncer.fire_if_due(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn burst_fires_once_after_last_event() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        for ms in [0, 100, 200, 300] {
            debouncer.record(start + Duration::from_millis(ms));
        }
        assert_eq!(debouncer.pending(), 4);
        assert_eq!(debouncer.deadline(), Some(start + Duration::from_millis(800)));

        assert!(!debouncer.fire_if_due(start + Duration::from_millis(700)));
        assert!(debouncer.fire_if_due(start + Duration::from_millis(800)));
        assert_eq!(debouncer.pending(), 0);
        assert!(!debouncer.fire_if_due(start + Duration::from_millis(900)));
    }

    #[test]
    fn later_event_starts_new_burst() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(QUIET);
        debouncer.record(start);
        assert!(debouncer.fire_if_due(start + QUIET));
        debouncer.record(start + Duration::from_secs(10));
        assert!(!debouncer.fire_if_due(start + Duration::from_secs(10)));
        assert!(debouncer.fire_if_due(start + Duration::from_secs(11)));
    }
}
