use crate::error::{Error, Result};
use crate::posture::Thresholds;

#[cfg(feature = "std")]
use std::path::Path;

/// Tunables for the whole pipeline. Times are milliseconds of the monotonic
/// clock, angles are degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct Config {
    /// Nominal period of the sampling loop.
    pub sample_interval_ms: u64,
    /// Weight of the newest angle in the EMA.
    pub ema_alpha: f32,
    pub slouch_enter_deg: f32,
    pub slouch_exit_deg: f32,
    /// Time above the enter threshold before a pending slouch is confirmed.
    pub slouch_dwell_ms: u64,
    /// Length of the calibration window.
    pub calibration_ms: u64,
    /// Minimum spacing between history records.
    pub history_interval_ms: u64,
    /// History capacity in records; reaching it halves the log.
    pub max_history: usize,
    pub display_interval_ms: u64,
    pub telemetry_interval_ms: u64,
    /// Smallest angle change (degrees) worth publishing again.
    pub telemetry_angle_delta: f32,
    /// Pause after a failed sensor read.
    pub sensor_retry_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: 50,
            ema_alpha: 0.45,
            slouch_enter_deg: 4.0,
            slouch_exit_deg: 2.5,
            slouch_dwell_ms: 300,
            calibration_ms: 3000,
            history_interval_ms: 2000,
            max_history: 5000,
            display_interval_ms: 250,
            telemetry_interval_ms: 2000,
            telemetry_angle_delta: 0.2,
            sensor_retry_ms: 100,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            return Err(Error::InvalidConfig("sample_interval_ms must be non-zero"));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(Error::InvalidConfig("ema_alpha must be in (0, 1]"));
        }
        if !(self.slouch_exit_deg < self.slouch_enter_deg) {
            return Err(Error::InvalidConfig(
                "slouch_exit_deg must be below slouch_enter_deg",
            ));
        }
        if self.calibration_samples() == 0 {
            return Err(Error::InvalidConfig(
                "calibration_ms must cover at least one sample interval",
            ));
        }
        if self.max_history < 2 {
            return Err(Error::InvalidConfig("max_history must be at least 2"));
        }
        if !(self.telemetry_angle_delta >= 0.0) {
            return Err(Error::InvalidConfig(
                "telemetry_angle_delta must not be negative",
            ));
        }
        Ok(())
    }

    /// Number of samples in the calibration window.
    pub fn calibration_samples(&self) -> usize {
        self.calibration_ms
            .checked_div(self.sample_interval_ms)
            .unwrap_or(0) as usize
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            enter_deg: self.slouch_enter_deg,
            exit_deg: self.slouch_exit_deg,
            dwell_ms: self.slouch_dwell_ms,
        }
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    #[cfg(feature = "std")]
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "std")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.calibration_samples(), 60);
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let config = Config {
            slouch_enter_deg: 2.0,
            slouch_exit_deg: 2.5,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_alpha() {
        for alpha in [0.0, -0.1, 1.5, f32::NAN] {
            let config = Config {
                ema_alpha: alpha,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "alpha {alpha} accepted");
        }
    }

    #[test]
    fn test_zero_sample_interval() {
        let config = Config {
            sample_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.calibration_samples(), 0);
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            "slouch_enter_deg = 6.0\nslouch_exit_deg = 3.0\nmax_history = 100\n",
        )
        .unwrap();
        assert_eq!(config.slouch_enter_deg, 6.0);
        assert_eq!(config.slouch_exit_deg, 3.0);
        assert_eq!(config.max_history, 100);
        assert_eq!(config.sample_interval_ms, 50);
        assert_eq!(config.ema_alpha, 0.45);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_toml_is_validated() {
        let err = Config::from_toml_str("slouch_exit_deg = 9.0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_toml_parse_error() {
        let err = Config::from_toml_str("max_history = \"lots\"\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "ema_alpha = 0.3\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.ema_alpha, 0.3);

        let missing = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
    }
}
