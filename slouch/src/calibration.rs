use core::fmt;

use micromath::vector::F32x3;

use crate::error::{Error, Result};
use crate::vector::{norm, normalize, MIN_NORM};

/// Calibrated "upright" gravity direction, always a unit vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline(F32x3);

impl Baseline {
    /// Accept `v` as a baseline if it has a usable direction.
    pub fn from_vector(v: F32x3) -> Result<Self> {
        let n = norm(v);
        if !(n >= MIN_NORM) {
            return Err(Error::DegenerateBaseline { norm: n });
        }
        Ok(Self(normalize(v)))
    }

    pub fn vector(&self) -> F32x3 {
        self.0
    }
}

impl Default for Baseline {
    /// Sensor lying flat, z axis up.
    fn default() -> Self {
        Self(F32x3 {
            x: 0.0,
            y: 0.0,
            z: 1.0,
        })
    }
}

impl fmt::Display for Baseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:+.3}, {:+.3}, {:+.3})", self.0.x, self.0.y, self.0.z)
    }
}

/// Collects a fixed window of raw samples while the user sits upright.
///
/// Each sample is reduced to its direction and the directions are summed;
/// the baseline is the direction of the sum. Averaging vectors rather than
/// angles keeps jitter from dragging the result and has no wrap-around.
#[derive(Debug, Clone)]
pub struct Calibrator {
    required: usize,
    collected: usize,
    sum: F32x3,
}

impl Calibrator {
    pub fn new(required: usize) -> Self {
        Self {
            required,
            collected: 0,
            sum: F32x3::default(),
        }
    }

    /// Add one sample. Returns `true` once the window is full; samples past
    /// that point are ignored.
    pub fn push(&mut self, sample: F32x3) -> bool {
        if self.is_complete() {
            return true;
        }

        self.sum = self.sum + normalize(sample);
        self.collected += 1;
        self.is_complete()
    }

    pub fn collected(&self) -> usize {
        self.collected
    }

    pub fn is_complete(&self) -> bool {
        self.collected >= self.required
    }

    pub fn reset(&mut self) {
        self.collected = 0;
        self.sum = F32x3::default();
    }

    pub fn finish(&self) -> Result<Baseline> {
        if !self.is_complete() {
            return Err(Error::CalibrationIncomplete {
                collected: self.collected,
                required: self.required,
            });
        }
        Baseline::from_vector(self.sum)
    }
}

/// One-shot calibration over an already collected window.
pub fn calibrate(samples: &[F32x3]) -> Result<Baseline> {
    let mut calibrator = Calibrator::new(samples.len());
    for sample in samples {
        calibrator.push(*sample);
    }
    calibrator.finish()
}
