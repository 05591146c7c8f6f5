use thiserror::Error;

/// Errors raised by the posture pipeline.
///
/// None of these are fatal to a running monitor: a rejected baseline keeps
/// the previous one in force and configuration errors surface before the
/// loop starts.
#[derive(Debug, Error)]
pub enum Error {
    /// The summed calibration vectors cancelled out (or every sample was zero).
    #[error("calibration produced a degenerate baseline (norm {norm:e})")]
    DegenerateBaseline { norm: f32 },

    /// `finish` was called before the calibration window filled up.
    #[error("calibration incomplete: {collected} of {required} samples")]
    CalibrationIncomplete { collected: usize, required: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[cfg(feature = "std")]
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "std")]
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
