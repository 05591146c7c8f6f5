//! Seated posture detection from a single 3-axis accelerometer.
//!
//! Each tick turns one raw acceleration sample into a posture event:
//!
//! 1. **Tilt** ([`TiltEstimator`]): the sample is reduced to its gravity
//!    direction and compared against the calibrated [`Baseline`], giving
//!    an angle that is smoothed with an exponential moving average.
//! 2. **State** ([`PostureTracker`]): a hysteresis band plus a dwell time
//!    turns the smoothed angle into `Good` / `SlouchPending` / `Slouching`
//!    and keeps the session counters.
//! 3. **History** ([`HistoryLog`]): a throttled `t,angle` log that halves
//!    itself when it reaches capacity.
//!
//! [`PostureMonitor`] wires the stages together with the telemetry and
//! display collaborators. The sensor, the clock and the sampling loop stay
//! with the caller.
//!
//! The crate is `no_std` + `alloc` with `default-features = false`. The
//! default `std` feature adds [`store::FileStore`] and TOML configuration.
//!
//! # Example
//!
//! ```
//! use micromath::vector::F32x3;
//! use slouch::{Config, HistoryLog, MemoryStore, NoopSink, PostureMonitor, PostureState, Tick};
//!
//! let config = Config::default();
//! let history = HistoryLog::open(Some(MemoryStore::new()), &config);
//! let mut monitor = PostureMonitor::new(config, history, NoopSink, NoopSink, 0).unwrap();
//!
//! let upright = F32x3 { x: 0.0, y: 0.0, z: 9.8 };
//! monitor.calibrate(&[upright; 60]).unwrap();
//! monitor.start(3000);
//!
//! match monitor.tick::<()>(Ok(upright), 3050, 1_700_000_000.0) {
//!     Tick::Updated(status) => assert_eq!(status.state, PostureState::Good),
//!     other => panic!("{other:?}"),
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod calibration;
pub mod config;
pub mod error;
pub mod filter;
pub mod history;
pub mod monitor;
pub mod posture;
pub mod sink;
pub mod store;
pub mod telemetry;
pub mod vector;

pub use micromath::vector::F32x3;

pub use calibration::{calibrate, Baseline, Calibrator};
pub use config::Config;
pub use error::{Error, Result};
pub use filter::{ema, TiltEstimator};
pub use history::{Appended, HistoryLog, HistoryRecord};
pub use monitor::{PostureMonitor, PostureStatus, Tick};
pub use posture::{PostureState, PostureTracker, SessionStats, Thresholds};
pub use sink::{ConsoleDisplay, DisplaySink, NoopSink, TelemetrySink};
pub use store::{HistoryStore, MemoryStore};
pub use telemetry::{TelemetryGate, TelemetryUpdate};
