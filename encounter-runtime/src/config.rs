//! Runtime configuration, loaded from `encounter.toml`.
//!
//! ```toml
//! [tick]
//! frames_per_second = 20.0
//!
//! [logging]
//! level = "info"
//!
//! [engine.damage]
//! history_window_secs = 600
//! ```

use std::time::Duration;

use encounter_core::config::EncounterConfig;
use encounter_core::error::EncounterError;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Region tick loop.
    #[serde(default)]
    pub tick: TickConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Engine settings passed to every behavior context.
    #[serde(default)]
    pub engine: EncounterConfig,
}

impl RuntimeConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns `RuntimeError::Config` on malformed TOML and
    /// `RuntimeError::Engine` when a value fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| RuntimeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject settings the runtime cannot start with.
    ///
    /// # Errors
    /// `EncounterError::InvalidTickRate` for a rate with no usable frame
    /// length, or the engine's own validation error.
    pub fn validate(&self) -> Result<()> {
        frame_duration(self.tick.frames_per_second)?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Length of one frame at `frames_per_second`.
///
/// # Errors
/// `EncounterError::InvalidTickRate` unless the rate is finite, positive and
/// gives a frame between one nanosecond and `Duration::MAX`.
pub fn frame_duration(frames_per_second: f64) -> std::result::Result<Duration, EncounterError> {
    if !(frames_per_second.is_finite() && frames_per_second > 0.0) {
        return Err(EncounterError::InvalidTickRate(frames_per_second));
    }
    match Duration::try_from_secs_f64(frames_per_second.recip()) {
        Ok(frame) if !frame.is_zero() => Ok(frame),
        _ => Err(EncounterError::InvalidTickRate(frames_per_second)),
    }
}

/// Region tick loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Ticks per second.
    #[serde(default = "default_fps")]
    pub frames_per_second: f64,
    /// Ticks between sweeps of expired properties.
    #[serde(default = "default_sweep_every")]
    pub sweep_every_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            frames_per_second: default_fps(),
            sweep_every_ticks: default_sweep_every(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_fps() -> f64 {
    20.0
}
fn default_sweep_every() -> u64 {
    200
}
fn default_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RuntimeConfig::from_toml("").expect("valid");
        assert!((config.tick.frames_per_second - 20.0).abs() < f64::EPSILON);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.damage.threat_window_secs, 60);
    }

    #[test]
    fn nested_engine_section_is_read() {
        let config = RuntimeConfig::from_toml(
            "[tick]\nframes_per_second = 30.0\n\n[engine.targeting]\nradar_reselect_secs = 2.5\n",
        )
        .expect("valid");
        assert!((config.tick.frames_per_second - 30.0).abs() < f64::EPSILON);
        assert!((config.engine.targeting.radar_reselect_secs - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_tick_rate_is_fatal() {
        let err = RuntimeConfig::from_toml("[tick]\nframes_per_second = 0.0\n").expect_err("invalid");
        assert!(matches!(err, RuntimeError::Engine(EncounterError::InvalidTickRate(_))));
    }

    #[test]
    fn vanishing_tick_rate_is_fatal() {
        let err = RuntimeConfig::from_toml("[tick]\nframes_per_second = 1e-20\n").expect_err("invalid");
        assert!(matches!(err, RuntimeError::Engine(EncounterError::InvalidTickRate(_))));
    }

    #[test]
    fn frame_duration_bounds() {
        assert_eq!(frame_duration(4.0).expect("valid"), Duration::from_millis(250));
        for fps in [1e-20, 1e300, f64::MIN_POSITIVE, -1.0, f64::NAN] {
            assert!(frame_duration(fps).is_err(), "{fps} accepted");
        }
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = RuntimeConfig::from_toml("[tick\n").expect_err("invalid");
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
