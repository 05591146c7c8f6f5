//! Output collaborators. The monitor only knows these traits; a device
//! without a screen or radio plugs in [`NoopSink`].

use log::info;

use crate::monitor::PostureStatus;
use crate::posture::PostureState;
use crate::telemetry::TelemetryUpdate;

pub trait TelemetrySink {
    /// Best effort. Must not fail the tick.
    fn publish(&mut self, update: &TelemetryUpdate);
}

pub trait DisplaySink {
    fn show(&mut self, status: &PostureStatus);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn publish(&mut self, _update: &TelemetryUpdate) {}
}

impl DisplaySink for NoopSink {
    fn show(&mut self, _status: &PostureStatus) {}
}

fn icon(state: PostureState) -> &'static str {
    match state {
        PostureState::Good => ":)",
        PostureState::SlouchPending => ":|",
        PostureState::Slouching => "!!",
    }
}

/// Writes one status line per refresh through the logger.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn show(&mut self, status: &PostureStatus) {
        info!("[{}] {:.1}deg {}", icon(status.state), status.angle, status.state);
    }
}
