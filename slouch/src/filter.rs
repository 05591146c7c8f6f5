use micromath::vector::F32x3;

use crate::calibration::Baseline;
use crate::vector::{angle_between, is_zero, normalize};

/// Exponential moving average step: `alpha` is the weight of `sample`.
pub fn ema(previous: f32, sample: f32, alpha: f32) -> f32 {
    alpha * sample + (1.0 - alpha) * previous
}

/// Tilt of the current gravity direction away from the calibrated baseline,
/// smoothed with an EMA.
#[derive(Debug, Clone)]
pub struct TiltEstimator {
    baseline: Baseline,
    alpha: f32,
    filtered: f32,
}

impl TiltEstimator {
    pub fn new(alpha: f32) -> Self {
        Self {
            baseline: Baseline::default(),
            alpha,
            filtered: 0.0,
        }
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    /// Replace the baseline. The filter restarts from zero so readings taken
    /// before calibration do not bias the first ones after it.
    pub fn set_baseline(&mut self, baseline: Baseline) {
        self.baseline = baseline;
        self.filtered = 0.0;
    }

    pub fn filtered(&self) -> f32 {
        self.filtered
    }

    /// Feed one raw acceleration sample. Returns the smoothed angle, or
    /// `None` when the sample has no usable direction (the filter is left
    /// untouched in that case).
    pub fn update(&mut self, sample: F32x3) -> Option<f32> {
        let g = normalize(sample);
        if is_zero(g) {
            return None;
        }

        let raw = angle_between(self.baseline.vector(), g);
        self.filtered = ema(self.filtered, raw, self.alpha);
        Some(self.filtered)
    }
}
