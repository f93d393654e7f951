use std::time::{Duration, Instant};

/// Recording window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    Active,
}

/// Wake-opened, duration-bounded capture window.
///
/// Opens on a wake event and stays active until `duration_bound` elapses or
/// it is closed explicitly. All queries take `now` so timeout behavior is
/// testable without sleeping.
#[derive(Debug)]
pub struct RecordingWindow {
    state: WindowState,
    started_at: Option<Instant>,
    duration_bound: Duration,
}

impl RecordingWindow {
    pub fn new(duration_bound: Duration) -> Self {
        Self {
            state: WindowState::Idle,
            started_at: None,
            duration_bound,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Open the window (wake detected). Re-opening while active resets the
    /// start time.
    pub fn open(&mut self, now: Instant) {
        self.state = WindowState::Active;
        self.started_at = Some(now);
    }

    /// Close the window explicitly.
    pub fn close(&mut self) {
        self.state = WindowState::Idle;
        self.started_at = None;
    }

    /// Transition to Idle if the duration bound has elapsed. Returns true
    /// exactly when this call performed the transition, so the caller can
    /// resume wake detection once.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        if self.state == WindowState::Active && !self.is_active_at(now) {
            self.close();
            return true;
        }
        false
    }

    /// Whether the window is active at `now`: open and within the bound.
    pub fn is_active_at(&self, now: Instant) -> bool {
        match (self.state, self.started_at) {
            (WindowState::Active, Some(start)) => now.duration_since(start) < self.duration_bound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let window = RecordingWindow::new(Duration::from_secs(60));
        assert_eq!(window.state(), WindowState::Idle);
        assert!(!window.is_active_at(Instant::now()));
    }

    #[test]
    fn active_within_bound_idle_at_and_after() {
        let bound = Duration::from_secs(60);
        let mut window = RecordingWindow::new(bound);
        let t0 = Instant::now();

        window.open(t0);
        assert!(window.is_active_at(t0));
        assert!(window.is_active_at(t0 + bound - Duration::from_millis(1)));
        assert!(!window.is_active_at(t0 + bound));
        assert!(!window.is_active_at(t0 + bound + Duration::from_secs(5)));
    }

    #[test]
    fn check_timeout_transitions_exactly_once() {
        let bound = Duration::from_secs(60);
        let mut window = RecordingWindow::new(bound);
        let t0 = Instant::now();

        window.open(t0);
        assert!(!window.check_timeout(t0 + Duration::from_secs(30)));
        assert_eq!(window.state(), WindowState::Active);

        assert!(window.check_timeout(t0 + bound));
        assert_eq!(window.state(), WindowState::Idle);

        // Already idle, no second transition
        assert!(!window.check_timeout(t0 + bound + Duration::from_secs(1)));
    }

    #[test]
    fn reopen_resets_start_time() {
        let bound = Duration::from_secs(60);
        let mut window = RecordingWindow::new(bound);
        let t0 = Instant::now();

        window.open(t0);
        window.open(t0 + Duration::from_secs(50));

        // Would have expired from the first open, still active from the second
        assert!(window.is_active_at(t0 + Duration::from_secs(70)));
    }

    #[test]
    fn explicit_close() {
        let mut window = RecordingWindow::new(Duration::from_secs(60));
        let t0 = Instant::now();

        window.open(t0);
        window.close();
        assert_eq!(window.state(), WindowState::Idle);
        assert!(!window.is_active_at(t0 + Duration::from_secs(1)));
    }
}
