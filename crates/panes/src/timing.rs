/// Time-driven helpers for the single-threaded UI loop. Callers pass the
/// current instant explicitly so behavior is deterministic under test.
use std::time::{Duration, Instant};

/// Trailing-edge debounce: each `schedule` pushes the deadline out.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once when the deadline has passed, then resets.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// Short-lived flag that makes handlers ignore the events caused by their
/// own mutations. Not a lock: everything runs on one thread.
#[derive(Debug, Clone)]
pub struct ReentrancyGuard {
    hold: Duration,
    until: Option<Instant>,
}

impl ReentrancyGuard {
    pub fn new(hold: Duration) -> Self {
        Self { hold, until: None }
    }

    pub fn engage(&mut self, now: Instant) {
        self.until = Some(now + self.hold);
    }

    /// Engaged until the hold time elapses or `release` is called.
    pub fn is_engaged(&self, now: Instant) -> bool {
        matches!(self.until, Some(until) if now < until)
    }

    /// Clears an expired guard. Returns whether it was cleared.
    pub fn release_if_elapsed(&mut self, now: Instant) -> bool {
        match self.until {
            Some(until) if now >= until => {
                self.until = None;
                true
            }
            _ => false,
        }
    }

    pub fn release(&mut self) {
        self.until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debouncer_coalesces() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        debouncer.schedule(start);
        debouncer.schedule(start + Duration::from_millis(300));
        assert!(!debouncer.fire_if_due(start + Duration::from_millis(600)));
        assert!(debouncer.fire_if_due(start + Duration::from_millis(800)));
        assert!(!debouncer.fire_if_due(start + Duration::from_millis(900)));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_guard_expires() {
        let start = Instant::now();
        let mut guard = ReentrancyGuard::new(Duration::from_millis(50));
        assert!(!guard.is_engaged(start));
        guard.engage(start);
        assert!(guard.is_engaged(start + Duration::from_millis(49)));
        assert!(!guard.release_if_elapsed(start + Duration::from_millis(10)));
        assert!(guard.release_if_elapsed(start + Duration::from_millis(50)));
        assert!(!guard.is_engaged(start + Duration::from_millis(50)));
    }
}
