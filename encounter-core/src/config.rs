//! Configuration for the encounter engine.
//!
//! Maps directly to the `[engine]` tables of `encounter.toml`. Every field
//! has a serde default, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::{EncounterError, Result};
use crate::movement::VelocityModifiers;

/// Top-level engine configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncounterConfig {
    /// Damage history windows.
    #[serde(default)]
    pub damage: DamageConfig,
    /// Radar target selection.
    #[serde(default)]
    pub targeting: TargetingConfig,
    /// Lifecycle notification thresholds.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Default velocity modifiers for prefabs that do not override them.
    #[serde(default)]
    pub movement: VelocityModifiers,
}

impl EncounterConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `EncounterError::Config` if the TOML is invalid or fails
    /// [`validate`](Self::validate).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| EncounterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    /// Returns `EncounterError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let d = &self.damage;
        if d.history_window_secs == 0 || d.threat_window_secs == 0 {
            return Err(EncounterError::Config(
                "damage windows must be greater than zero".into(),
            ));
        }
        if d.threat_window_secs > d.history_window_secs {
            return Err(EncounterError::Config(format!(
                "damage.threat_window_secs ({}) exceeds damage.history_window_secs ({})",
                d.threat_window_secs, d.history_window_secs
            )));
        }
        if self.targeting.radar_reselect_secs <= 0.0 {
            return Err(EncounterError::Config(
                "targeting.radar_reselect_secs must be positive".into(),
            ));
        }

        let n = &self.notifications;
        if !(0.0 < n.shield_low_ratio && n.shield_low_ratio < n.shield_half_ratio && n.shield_half_ratio <= 1.0) {
            return Err(EncounterError::Config(format!(
                "shield thresholds must satisfy 0 < low ({}) < half ({}) <= 1",
                n.shield_low_ratio, n.shield_half_ratio
            )));
        }
        if !(0.0 < n.core_stress_high_ratio && n.core_stress_high_ratio <= 1.0) {
            return Err(EncounterError::Config(format!(
                "notifications.core_stress_high_ratio ({}) must be in (0, 1]",
                n.core_stress_high_ratio
            )));
        }

        let m = &self.movement;
        if m.too_close_distance < 0.0 || m.too_close_distance >= m.far_distance {
            return Err(EncounterError::Config(format!(
                "movement.too_close_distance ({}) must be in [0, far_distance ({}))",
                m.too_close_distance, m.far_distance
            )));
        }
        if m.brake_distance_factor < 0.0 {
            return Err(EncounterError::Config(
                "movement.brake_distance_factor must not be negative".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Time windows applied to the damage ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageConfig {
    /// Entries older than this are excluded from every query.
    #[serde(default = "default_600")]
    pub history_window_secs: u64,
    /// Window used for threat ranking.
    #[serde(default = "default_60")]
    pub threat_window_secs: u64,
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            history_window_secs: 600,
            threat_window_secs: 60,
        }
    }
}

impl DamageConfig {
    /// History window as a chrono duration.
    #[must_use]
    pub fn history_window(&self) -> chrono::Duration {
        seconds(self.history_window_secs)
    }

    /// Threat window as a chrono duration.
    #[must_use]
    pub fn threat_window(&self) -> chrono::Duration {
        seconds(self.threat_window_secs)
    }
}

/// Radar target re-selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetingConfig {
    /// Seconds of accumulated tick time before the random personality
    /// picks a new contact.
    #[serde(default = "default_5_f64")]
    pub radar_reselect_secs: f64,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            radar_reselect_secs: 5.0,
        }
    }
}

/// Thresholds that turn shield/core readings into lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Shield ratio at or below which `ShieldHalf` fires.
    #[serde(default = "default_0_5")]
    pub shield_half_ratio: f64,
    /// Shield ratio at or below which `ShieldLow` fires.
    #[serde(default = "default_0_25")]
    pub shield_low_ratio: f64,
    /// Core stress ratio at or above which `CoreStressHigh` fires.
    #[serde(default = "default_0_8")]
    pub core_stress_high_ratio: f64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            shield_half_ratio: 0.5,
            shield_low_ratio: 0.25,
            core_stress_high_ratio: 0.8,
        }
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
    chrono::Duration::seconds(secs)
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_600() -> u64 {
    600
}
fn default_60() -> u64 {
    60
}
fn default_5_f64() -> f64 {
    5.0
}
fn default_0_5() -> f64 {
    0.5
}
fn default_0_25() -> f64 {
    0.25
}
fn default_0_8() -> f64 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EncounterConfig::from_toml("").expect("empty config is valid");
        assert_eq!(config.damage.history_window_secs, 600);
        assert_eq!(config.damage.threat_window_secs, 60);
        assert!((config.targeting.radar_reselect_secs - 5.0).abs() < f64::EPSILON);
        assert!((config.notifications.shield_half_ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = EncounterConfig::from_toml(
            "[damage]\nthreat_window_secs = 30\n\n[movement]\nfar_distance = 50000.0\n",
        )
        .expect("valid config");
        assert_eq!(config.damage.threat_window_secs, 30);
        assert_eq!(config.damage.history_window_secs, 600);
        assert!((config.movement.far_distance - 50_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn threat_window_longer_than_history_is_rejected() {
        let err = EncounterConfig::from_toml(
            "[damage]\nhistory_window_secs = 30\nthreat_window_secs = 60\n",
        )
        .expect_err("invalid windows");
        assert!(matches!(err, EncounterError::Config(_)));
    }

    #[test]
    fn inverted_shield_thresholds_are_rejected() {
        let err = EncounterConfig::from_toml(
            "[notifications]\nshield_half_ratio = 0.2\nshield_low_ratio = 0.4\n",
        )
        .expect_err("invalid thresholds");
        assert!(err.to_string().contains("shield thresholds"));
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = EncounterConfig::from_toml("[damage\n").expect_err("malformed");
        assert!(matches!(err, EncounterError::Config(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[targeting]\nradar_reselect_secs = 2.5").expect("write");
        let config = EncounterConfig::from_file(file.path()).expect("load");
        assert!((config.targeting.radar_reselect_secs - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EncounterConfig::from_file(std::path::Path::new("/nonexistent/encounter.toml"))
            .expect_err("missing file");
        assert!(matches!(err, EncounterError::Io(_)));
    }
}
