use std::time::{Duration, Instant};

/// Holds the latest scheduled value until a quiet period has passed.
///
/// Scheduling again before the deadline replaces the value and pushes the
/// deadline out, so a burst of edits yields one flush of the final state.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<T>,
    due_at: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            due_at: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.due_at = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn due_at(&self) -> Option<Instant> {
        self.due_at
    }

    pub fn take_due(&mut self, now: Instant) -> Option<T> {
        match self.due_at {
            Some(due_at) if now >= due_at => self.flush(),
            _ => None,
        }
    }

    pub fn flush(&mut self) -> Option<T> {
        self.due_at = None;
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.due_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_quiet_period() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.schedule(1, start);
        assert!(debouncer.take_due(start + Duration::from_millis(99)).is_none());
        assert_eq!(debouncer.take_due(start + Duration::from_millis(100)), Some(1));
        assert!(!debouncer.is_pending());
        assert!(debouncer.take_due(start + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn rescheduling_keeps_last_value_and_resets_deadline() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.schedule("first", start);
        debouncer.schedule("second", start + Duration::from_millis(80));
        debouncer.schedule("third", start + Duration::from_millis(160));

        assert!(debouncer.take_due(start + Duration::from_millis(200)).is_none());
        assert_eq!(
            debouncer.due_at(),
            Some(start + Duration::from_millis(260))
        );
        assert_eq!(
            debouncer.take_due(start + Duration::from_millis(260)),
            Some("third")
        );
        assert!(debouncer.take_due(start + Duration::from_millis(400)).is_none());
    }

    #[test]
    fn flush_and_cancel() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(2));
        debouncer.schedule(7, start);
        assert_eq!(debouncer.flush(), Some(7));
        assert!(debouncer.due_at().is_none());

        debouncer.schedule(8, start);
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        assert!(debouncer.take_due(start + Duration::from_secs(10)).is_none());
    }
}
