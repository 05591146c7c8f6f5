#[allow(unused_imports)]
use micromath::F32Ext;

use crate::config::Config;
use crate::posture::PostureState;

/// Fields that changed enough to be worth sending. `None` means "unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TelemetryUpdate {
    /// Rounded to 0.1 degree.
    pub angle: Option<f32>,
    pub state: Option<PostureState>,
    pub slouch_count: Option<u32>,
}

impl TelemetryUpdate {
    pub fn is_empty(&self) -> bool {
        self.angle.is_none() && self.state.is_none() && self.slouch_count.is_none()
    }
}

/// Rate limit and change detection in front of a telemetry transport.
///
/// At most one update per interval. Within it the angle goes out only when
/// it moved by at least the configured delta since it was last sent, the
/// state and count only when they changed.
#[derive(Debug, Clone)]
pub struct TelemetryGate {
    interval_ms: u64,
    delta_tenths: i32,
    last_push_ms: Option<u64>,
    last_angle_tenths: Option<i32>,
    last_state: Option<PostureState>,
    last_count: Option<u32>,
}

fn tenths(angle: f32) -> i32 {
    (angle * 10.0).round() as i32
}

impl TelemetryGate {
    pub fn new(config: &Config) -> Self {
        Self {
            interval_ms: config.telemetry_interval_ms,
            delta_tenths: tenths(config.telemetry_angle_delta),
            last_push_ms: None,
            last_angle_tenths: None,
            last_state: None,
            last_count: None,
        }
    }

    pub fn offer(
        &mut self,
        now_ms: u64,
        angle: f32,
        state: PostureState,
        slouch_count: u32,
    ) -> Option<TelemetryUpdate> {
        if let Some(last) = self.last_push_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return None;
            }
        }
        self.last_push_ms = Some(now_ms);

        let mut update = TelemetryUpdate::default();

        let angle_tenths = tenths(angle);
        let moved = match self.last_angle_tenths {
            Some(last) => (angle_tenths - last).abs() >= self.delta_tenths,
            None => true,
        };
        if moved {
            update.angle = Some(angle_tenths as f32 / 10.0);
            self.last_angle_tenths = Some(angle_tenths);
        }

        if self.last_state != Some(state) {
            update.state = Some(state);
            self.last_state = Some(state);
        }

        if self.last_count != Some(slouch_count) {
            update.slouch_count = Some(slouch_count);
            self.last_count = Some(slouch_count);
        }

        (!update.is_empty()).then_some(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_offer_sends_everything() {
        let mut gate = TelemetryGate::new(&Config::default());
        let update = gate.offer(0, 1.23, PostureState::Good, 0).unwrap();

        assert_eq!(update.angle, Some(1.2));
        assert_eq!(update.state, Some(PostureState::Good));
        assert_eq!(update.slouch_count, Some(0));
    }

    #[test]
    fn test_rate_limited() {
        let mut gate = TelemetryGate::new(&Config::default());
        gate.offer(0, 1.0, PostureState::Good, 0);

        assert_eq!(gate.offer(1999, 30.0, PostureState::Slouching, 4), None);
        assert!(gate.offer(2000, 30.0, PostureState::Slouching, 4).is_some());
    }

    #[test]
    fn test_only_changes_are_sent() {
        let mut gate = TelemetryGate::new(&Config::default());
        gate.offer(0, 1.0, PostureState::Good, 0);

        // Angle moved 0.1 only, nothing else changed.
        assert_eq!(gate.offer(2000, 1.1, PostureState::Good, 0), None);

        let update = gate.offer(4000, 1.2, PostureState::SlouchPending, 0).unwrap();
        assert_eq!(update.angle, Some(1.2));
        assert_eq!(update.state, Some(PostureState::SlouchPending));
        assert_eq!(update.slouch_count, None);

        let update = gate.offer(6000, 1.3, PostureState::Good, 1).unwrap();
        assert_eq!(update.angle, None);
        assert_eq!(update.state, Some(PostureState::Good));
        assert_eq!(update.slouch_count, Some(1));
    }

    #[test]
    fn test_small_drift_accumulates() {
        let mut gate = TelemetryGate::new(&Config::default());
        gate.offer(0, 5.0, PostureState::Good, 0);

        assert_eq!(gate.offer(2000, 5.1, PostureState::Good, 0), None);
        // Measured against the last value sent, not the last value seen.
        let update = gate.offer(4000, 5.2, PostureState::Good, 0).unwrap();
        assert_eq!(update.angle, Some(5.2));
    }
}
