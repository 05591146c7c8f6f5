use core::fmt;

use log::{debug, info, warn};
use micromath::vector::F32x3;

use crate::calibration::{calibrate, Baseline, Calibrator};
use crate::config::Config;
use crate::error::Result;
use crate::filter::TiltEstimator;
use crate::history::{HistoryLog, HistoryRecord};
use crate::posture::{PostureState, PostureTracker, SessionStats};
use crate::sink::{DisplaySink, TelemetrySink};
use crate::store::HistoryStore;
use crate::telemetry::TelemetryGate;

/// Snapshot produced by every tick that had a usable reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureStatus {
    /// Smoothed tilt from the baseline, degrees.
    pub angle: f32,
    pub state: PostureState,
    /// `state` differs from the previous tick.
    pub changed: bool,
    /// Set on the first tick of each confirmed slouch.
    pub slouch_alert: bool,
    pub stats: SessionStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// The sensor read failed; the driver should pause and retry.
    SensorFault,
    /// The sample had no usable direction.
    NoReading,
    Updated(PostureStatus),
}

/// The posture pipeline and its collaborators for one monitoring session.
///
/// The driver owns the clock and the sensor: it performs the calibration
/// reads, then calls [`PostureMonitor::tick`] once per sampling period.
pub struct PostureMonitor<S, T, D> {
    config: Config,
    estimator: TiltEstimator,
    tracker: PostureTracker,
    history: HistoryLog<S>,
    gate: TelemetryGate,
    telemetry: T,
    display: D,
    last_display_ms: Option<u64>,
}

impl<S, T, D> PostureMonitor<S, T, D>
where
    S: HistoryStore,
    T: TelemetrySink,
    D: DisplaySink,
{
    pub fn new(
        config: Config,
        history: HistoryLog<S>,
        telemetry: T,
        display: D,
        now_ms: u64,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            estimator: TiltEstimator::new(config.ema_alpha),
            tracker: PostureTracker::new(config.thresholds(), now_ms),
            gate: TelemetryGate::new(&config),
            config,
            history,
            telemetry,
            display,
            last_display_ms: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// An empty calibration window sized from the config.
    pub fn calibrator(&self) -> Calibrator {
        Calibrator::new(self.config.calibration_samples())
    }

    /// Install a new baseline and restart the filter from zero.
    pub fn set_baseline(&mut self, baseline: Baseline) {
        info!("Baseline g: {}", baseline);
        self.estimator.set_baseline(baseline);
    }

    /// Calibrate from an already collected window. A degenerate result is
    /// rejected and the current baseline stays in force.
    pub fn calibrate(&mut self, samples: &[F32x3]) -> Result<Baseline> {
        let baseline = calibrate(samples).inspect_err(|e| warn!("Calibration rejected: {}", e))?;
        self.set_baseline(baseline);
        Ok(baseline)
    }

    /// Start the good-posture streak at `now_ms`, normally right after the
    /// first calibration.
    pub fn start(&mut self, now_ms: u64) {
        self.tracker.restart_streak(now_ms);
        info!("Monitoring posture...");
    }

    /// Run one sample through filter, state machine, telemetry, history and
    /// display, in that order.
    pub fn tick<E: fmt::Debug>(
        &mut self,
        reading: core::result::Result<F32x3, E>,
        now_ms: u64,
        unix_secs: f64,
    ) -> Tick {
        let sample = match reading {
            Ok(sample) => sample,
            Err(e) => {
                warn!("IMU read failed: {:?}", e);
                return Tick::SensorFault;
            }
        };

        let Some(angle) = self.estimator.update(sample) else {
            debug!("Degenerate acceleration sample, tick skipped");
            return Tick::NoReading;
        };

        let (state, changed) = self.tracker.update(angle, now_ms);
        let slouch_alert = self.tracker.take_slouch_alert();
        if slouch_alert {
            warn!("Slouch detected ({:.1} deg)", angle);
        }

        let status = PostureStatus {
            angle,
            state,
            changed,
            slouch_alert,
            stats: *self.tracker.stats(),
        };

        if let Some(update) = self
            .gate
            .offer(now_ms, angle, state, status.stats.slouch_count)
        {
            self.telemetry.publish(&update);
        }

        self.history.append(
            now_ms,
            HistoryRecord {
                unix_secs,
                angle_deg: angle,
            },
        );

        let display_due = match self.last_display_ms {
            Some(last) => now_ms.saturating_sub(last) >= self.config.display_interval_ms,
            None => true,
        };
        if display_due {
            self.display.show(&status);
            self.last_display_ms = Some(now_ms);
        }

        Tick::Updated(status)
    }

    pub fn baseline(&self) -> Baseline {
        self.estimator.baseline()
    }

    pub fn filtered_angle(&self) -> f32 {
        self.estimator.filtered()
    }

    pub fn state(&self) -> PostureState {
        self.tracker.state()
    }

    pub fn stats(&self) -> &SessionStats {
        self.tracker.stats()
    }

    pub fn history(&self) -> &HistoryLog<S> {
        &self.history
    }

    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    pub fn display(&self) -> &D {
        &self.display
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use alloc::vec::Vec;
    use micromath::vector::Vector;

    use crate::error::Error;
    use crate::sink::NoopSink;
    use crate::store::MemoryStore;
    use crate::telemetry::TelemetryUpdate;

    #[derive(Default)]
    struct Recorder {
        updates: Vec<TelemetryUpdate>,
        shown: Vec<PostureStatus>,
    }

    impl TelemetrySink for Recorder {
        fn publish(&mut self, update: &TelemetryUpdate) {
            self.updates.push(*update);
        }
    }

    impl DisplaySink for Recorder {
        fn show(&mut self, status: &PostureStatus) {
            self.shown.push(*status);
        }
    }

    fn upright() -> F32x3 {
        F32x3::from_slice(&[0.0, 0.0, 9.8])
    }

    fn monitor() -> PostureMonitor<MemoryStore, Recorder, Recorder> {
        let config = Config::default();
        let history = HistoryLog::open(Some(MemoryStore::new()), &config);
        PostureMonitor::new(config, history, Recorder::default(), Recorder::default(), 0).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = Config {
            ema_alpha: 0.0,
            ..Config::default()
        };
        let history = HistoryLog::<MemoryStore>::open(None, &config);
        let result = PostureMonitor::new(config, history, NoopSink, NoopSink, 0);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_calibration_zeroes_angle() {
        let mut monitor = monitor();
        monitor.tick::<()>(Ok(F32x3::from_slice(&[9.8, 0.0, 0.0])), 0, 0.0);
        assert!(monitor.filtered_angle() > 0.0);

        let samples = [upright(); 60];
        monitor.calibrate(&samples).unwrap();
        assert_eq!(monitor.filtered_angle(), 0.0);

        match monitor.tick::<()>(Ok(upright()), 50, 0.0) {
            Tick::Updated(status) => assert_eq!(status.angle, 0.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_degenerate_calibration_keeps_baseline() {
        let mut monitor = monitor();
        monitor
            .calibrate(&[F32x3::from_slice(&[0.0, 9.8, 0.0]); 4])
            .unwrap();
        let before = monitor.baseline();

        assert!(monitor.calibrate(&[F32x3::default(); 60]).is_err());
        assert_eq!(monitor.baseline(), before);
    }

    #[test]
    fn test_sensor_fault_skips_tick() {
        let mut monitor = monitor();
        let tick = monitor.tick(Err("i2c nack"), 0, 0.0);

        assert_eq!(tick, Tick::SensorFault);
        assert!(monitor.history().is_empty());
        assert!(monitor.telemetry().updates.is_empty());
        assert!(monitor.display().shown.is_empty());
    }

    #[test]
    fn test_zero_sample_is_no_reading() {
        let mut monitor = monitor();
        assert_eq!(
            monitor.tick::<()>(Ok(F32x3::default()), 0, 0.0),
            Tick::NoReading
        );
        assert_eq!(monitor.state(), PostureState::Good);
    }

    #[test]
    fn test_display_and_telemetry_throttled() {
        let mut monitor = monitor();
        monitor.calibrate(&[upright(); 60]).unwrap();

        for i in 0..40u64 {
            monitor.tick::<()>(Ok(upright()), i * 50, 1000.0);
        }

        // 2 s of ticks: display every 250 ms, telemetry once, history once.
        assert_eq!(monitor.display().shown.len(), 8);
        assert_eq!(monitor.telemetry().updates.len(), 1);
        assert_eq!(monitor.history().len(), 1);
    }

    #[test]
    fn test_alert_fires_once() {
        let mut monitor = monitor();
        monitor.calibrate(&[upright(); 60]).unwrap();
        let leaning = F32x3::from_slice(&[0.0, 9.8, 9.8]);

        let alerts = (0..40u64)
            .filter_map(|i| match monitor.tick::<()>(Ok(leaning), i * 50, 0.0) {
                Tick::Updated(status) => Some(status.slouch_alert),
                _ => None,
            })
            .filter(|alert| *alert)
            .count();

        assert_eq!(alerts, 1);
        assert_eq!(monitor.state(), PostureState::Slouching);
    }
}
