use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureState {
    Good,
    /// Above the enter threshold, waiting out the dwell time.
    SlouchPending,
    Slouching,
}

impl PostureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureState::Good => "good",
            PostureState::SlouchPending => "slouch_pending",
            PostureState::Slouching => "slouching",
        }
    }

    /// Compact wire code used by telemetry transports.
    pub fn code(&self) -> u8 {
        match self {
            PostureState::Good => 0,
            PostureState::SlouchPending => 1,
            PostureState::Slouching => 2,
        }
    }
}

impl fmt::Display for PostureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hysteresis band and debounce for the slouch detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub enter_deg: f32,
    pub exit_deg: f32,
    pub dwell_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            enter_deg: 4.0,
            exit_deg: 2.5,
            dwell_ms: 300,
        }
    }
}

/// Per-session counters. They live as long as the process does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub slouch_count: u32,
    /// Total confirmed slouch time, dwell included.
    pub slouch_time_ms: u64,
    pub best_streak_ms: u64,
    pub current_streak_ms: u64,
}

/// Turns the smoothed tilt angle into posture events.
///
/// `Good` moves to `SlouchPending` at or above `enter_deg`. While pending
/// only the exit bound is checked: falling below `exit_deg` is a false alarm,
/// otherwise the slouch is confirmed once `dwell_ms` has passed since the
/// pending state began, even if the angle wandered back between the two
/// thresholds. A confirmed slouch ends below `exit_deg`.
#[derive(Debug, Clone)]
pub struct PostureTracker {
    thresholds: Thresholds,
    state: PostureState,
    pending_since_ms: u64,
    slouch_start_ms: u64,
    alert_pending: bool,
    last_good_ms: u64,
    stats: SessionStats,
}

impl PostureTracker {
    pub fn new(thresholds: Thresholds, now_ms: u64) -> Self {
        Self {
            thresholds,
            state: PostureState::Good,
            pending_since_ms: 0,
            slouch_start_ms: 0,
            alert_pending: false,
            last_good_ms: now_ms,
            stats: SessionStats::default(),
        }
    }

    /// Start measuring the good-posture streak from `now_ms`.
    pub fn restart_streak(&mut self, now_ms: u64) {
        self.last_good_ms = now_ms;
        self.stats.current_streak_ms = 0;
    }

    pub fn state(&self) -> PostureState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Advance the machine by one smoothed reading. Returns the new state
    /// and whether it differs from the previous one.
    pub fn update(&mut self, angle_deg: f32, now_ms: u64) -> (PostureState, bool) {
        let prev = self.state;

        match self.state {
            PostureState::Good => {
                self.stats.current_streak_ms = now_ms.saturating_sub(self.last_good_ms);
                if self.stats.current_streak_ms > self.stats.best_streak_ms {
                    self.stats.best_streak_ms = self.stats.current_streak_ms;
                }

                if angle_deg >= self.thresholds.enter_deg {
                    self.state = PostureState::SlouchPending;
                    self.pending_since_ms = now_ms;
                }
            }

            PostureState::SlouchPending => {
                if angle_deg < self.thresholds.exit_deg {
                    self.state = PostureState::Good;
                } else if now_ms.saturating_sub(self.pending_since_ms) >= self.thresholds.dwell_ms {
                    self.state = PostureState::Slouching;
                    // The dwell counts toward the slouch.
                    self.slouch_start_ms = self.pending_since_ms;
                    self.alert_pending = true;
                }
            }

            PostureState::Slouching => {
                if angle_deg < self.thresholds.exit_deg {
                    self.stats.slouch_count += 1;
                    self.stats.slouch_time_ms += now_ms.saturating_sub(self.slouch_start_ms);
                    self.restart_streak(now_ms);
                    self.state = PostureState::Good;
                }
            }
        }

        (self.state, self.state != prev)
    }

    /// One-shot notification: `true` the first time it is asked during each
    /// confirmed slouch.
    pub fn take_slouch_alert(&mut self) -> bool {
        if self.state == PostureState::Slouching && self.alert_pending {
            self.alert_pending = false;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK_MS: u64 = 50;

    /// Feed `angle` every tick from `from_ms` (inclusive) to `to_ms`
    /// (exclusive), collecting the transitions.
    fn feed(
        tracker: &mut PostureTracker,
        angle: f32,
        from_ms: u64,
        to_ms: u64,
    ) -> alloc::vec::Vec<(u64, PostureState)> {
        let mut changes = alloc::vec::Vec::new();
        let mut now = from_ms;
        while now < to_ms {
            let (state, changed) = tracker.update(angle, now);
            if changed {
                changes.push((now, state));
            }
            now += TICK_MS;
        }
        changes
    }

    #[test]
    fn test_slouch_round_trip() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);

        let changes = feed(&mut tracker, 10.0, 1000, 1500);
        assert_eq!(
            changes,
            [
                (1000, PostureState::SlouchPending),
                (1300, PostureState::Slouching)
            ]
        );
        assert!(tracker.take_slouch_alert());
        assert!(!tracker.take_slouch_alert());

        let (state, changed) = tracker.update(0.0, 1500);
        assert_eq!(state, PostureState::Good);
        assert!(changed);

        let stats = tracker.stats();
        assert_eq!(stats.slouch_count, 1);
        assert_eq!(stats.slouch_time_ms, 500);
        assert_eq!(stats.current_streak_ms, 0);
    }

    #[test]
    fn test_between_thresholds_stays_good() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);
        let changes = feed(&mut tracker, 3.0, 0, 60_000);

        assert!(changes.is_empty());
        assert_eq!(tracker.state(), PostureState::Good);
        assert_eq!(tracker.stats().slouch_count, 0);
    }

    #[test]
    fn test_false_alarm() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);

        feed(&mut tracker, 5.0, 0, 100);
        assert_eq!(tracker.state(), PostureState::SlouchPending);

        let (state, changed) = tracker.update(1.0, 100);
        assert_eq!(state, PostureState::Good);
        assert!(changed);
        assert_eq!(tracker.stats().slouch_count, 0);
        assert_eq!(tracker.stats().slouch_time_ms, 0);
        assert!(!tracker.take_slouch_alert());
    }

    #[test]
    fn test_pending_only_checks_exit() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);

        tracker.update(4.0, 0);
        assert_eq!(tracker.state(), PostureState::SlouchPending);

        // Drifts back into the hysteresis band but never below exit.
        let changes = feed(&mut tracker, 3.0, 50, 400);
        assert_eq!(changes, [(300, PostureState::Slouching)]);
    }

    #[test]
    fn test_slouching_holds_inside_band() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);
        feed(&mut tracker, 8.0, 0, 400);
        assert_eq!(tracker.state(), PostureState::Slouching);

        let changes = feed(&mut tracker, 2.6, 400, 5000);
        assert!(changes.is_empty());
        assert_eq!(tracker.state(), PostureState::Slouching);
    }

    #[test]
    fn test_no_skip_from_good_to_slouching() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);
        // A huge jump still goes through the pending state first.
        let (state, _) = tracker.update(90.0, 10_000);
        assert_eq!(state, PostureState::SlouchPending);
    }

    #[test]
    fn test_streaks() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);

        feed(&mut tracker, 0.0, 0, 10_050);
        assert_eq!(tracker.stats().current_streak_ms, 10_000);
        assert_eq!(tracker.stats().best_streak_ms, 10_000);

        feed(&mut tracker, 10.0, 10_050, 11_000);
        tracker.update(0.0, 11_000);
        assert_eq!(tracker.stats().current_streak_ms, 0);

        feed(&mut tracker, 0.0, 11_050, 14_050);
        assert_eq!(tracker.stats().current_streak_ms, 3_000);
        // The tick that entered the pending state still counted as good.
        assert_eq!(tracker.stats().best_streak_ms, 10_050);
    }

    #[test]
    fn test_false_alarm_does_not_reset_streak() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);
        tracker.update(5.0, 1000);
        tracker.update(0.0, 1100);
        tracker.update(0.0, 2000);
        assert_eq!(tracker.stats().current_streak_ms, 2000);
    }

    #[test]
    fn test_accumulates_slouch_time() {
        let mut tracker = PostureTracker::new(Thresholds::default(), 0);
        for start in [0u64, 10_000] {
            feed(&mut tracker, 12.0, start, start + 2000);
            tracker.update(1.0, start + 2000);
        }
        assert_eq!(tracker.stats().slouch_count, 2);
        assert_eq!(tracker.stats().slouch_time_ms, 4000);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PostureState::SlouchPending.as_str(), "slouch_pending");
        assert_eq!(alloc::format!("{}", PostureState::Slouching), "slouching");
        assert_eq!(PostureState::Good.code(), 0);
    }
}
