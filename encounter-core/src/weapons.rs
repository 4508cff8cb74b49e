//! Weapon falloff and optimal range.
//!
//! A weapon deals full damage up to its optimal distance and loses it
//! linearly over the falloff distance beyond that. The "half-falloff firing
//! distance" (optimal + falloff / 2) is where it still deals half damage,
//! and is what the movement planner treats as the construct's optimal range.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A weapon as configured on a prefab. Read-only for the context lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponDefinition {
    /// Display name, used only for logs.
    pub name: String,
    /// Distance up to which the weapon deals full damage (metres).
    pub base_optimal_distance: f64,
    /// Distance over which damage falls to zero past the optimal (metres).
    pub base_falloff_distance: f64,
    /// Multiplier applied to the optimal distance by installed modifiers.
    #[serde(default = "default_one")]
    pub optimal_distance_multiplier: f64,
    /// Multiplier applied to the falloff distance by installed modifiers.
    #[serde(default = "default_one")]
    pub falloff_distance_multiplier: f64,
}

impl WeaponDefinition {
    /// Create a weapon without modifiers.
    #[must_use]
    pub fn new(name: impl Into<String>, optimal_distance: f64, falloff_distance: f64) -> Self {
        Self {
            name: name.into(),
            base_optimal_distance: optimal_distance,
            base_falloff_distance: falloff_distance,
            optimal_distance_multiplier: 1.0,
            falloff_distance_multiplier: 1.0,
        }
    }

    /// Effective optimal distance.
    #[must_use]
    pub fn optimal_distance(&self) -> f64 {
        (self.base_optimal_distance * self.optimal_distance_multiplier).max(0.0)
    }

    /// Effective falloff distance.
    #[must_use]
    pub fn falloff_distance(&self) -> f64 {
        (self.base_falloff_distance * self.falloff_distance_multiplier).max(0.0)
    }

    /// Distance at which the weapon still deals half damage.
    #[must_use]
    pub fn half_falloff_firing_distance(&self) -> f64 {
        self.optimal_distance() + self.falloff_distance() / 2.0
    }

    /// Fraction of full damage dealt at `distance` (0–1).
    #[must_use]
    pub fn damage_factor_at(&self, distance: f64) -> f64 {
        let optimal = self.optimal_distance();
        if distance <= optimal {
            return 1.0;
        }
        let falloff = self.falloff_distance();
        if falloff <= 0.0 {
            return 0.0;
        }
        (1.0 - (distance - optimal) / falloff).clamp(0.0, 1.0)
    }
}

/// Optimal range for a weapon loadout engaging at `target_distance`.
///
/// Picks the weapon with the best damage factor at that distance (ties go to
/// the longer half-falloff distance) and returns its half-falloff firing
/// distance. An unarmed construct has an optimal range of 0.
#[must_use]
pub fn optimal_range(weapons: &[WeaponDefinition], target_distance: f64) -> f64 {
    weapons
        .iter()
        .max_by_key(|w| {
            (
                OrderedFloat(w.damage_factor_at(target_distance)),
                OrderedFloat(w.half_falloff_firing_distance()),
            )
        })
        .map_or(0.0, WeaponDefinition::half_falloff_firing_distance)
}

fn default_one() -> f64 {
    1.0
}
