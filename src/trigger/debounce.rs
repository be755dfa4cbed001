use std::time::{Duration, Instant};

/// Per-source debounce measured from the last accepted edge
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Whether an edge at `at` falls outside the window
    pub fn would_accept(&self, at: Instant) -> bool {
        match self.last_accepted {
            None => true,
            Some(previous) => at.saturating_duration_since(previous) >= self.window,
        }
    }

    pub fn record(&mut self, at: Instant) {
        self.last_accepted = Some(at);
    }

    pub fn accept(&mut self, at: Instant) -> bool {
        if self.would_accept(at) {
            self.record(at);
            true
        } else {
            false
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_edge_accepted() {
        let mut debouncer = Debouncer::new(Duration::from_secs(5));
        assert!(debouncer.accept(Instant::now()));
    }

    #[test]
    fn test_edges_inside_window_rejected() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(5));

        assert!(debouncer.accept(start));
        assert!(!debouncer.accept(start + Duration::from_secs(1)));
        assert!(!debouncer.accept(start + Duration::from_millis(4999)));
        assert!(debouncer.accept(start + Duration::from_secs(5)));
    }

    #[test]
    fn test_window_measured_from_accepted_edge() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(Duration::from_secs(60));

        assert!(debouncer.accept(start));
        // Rejected edges must not push the window forward
        assert!(!debouncer.accept(start + Duration::from_secs(59)));
        assert!(debouncer.accept(start + Duration::from_secs(60)));
        assert_eq!(
            debouncer.last_accepted(),
            Some(start + Duration::from_secs(60))
        );
    }

    #[test]
    fn test_would_accept_does_not_record() {
        let start = Instant::now();
        let debouncer = Debouncer::new(Duration::from_secs(5));
        assert!(debouncer.would_accept(start));
        assert!(debouncer.would_accept(start));
        assert_eq!(debouncer.last_accepted(), None);
    }
}
