//! Velocity/movement planner: how fast to fly given range and geometry.
//!
//! The planner sorts the current engagement into a [`RangeBand`] and derives
//! a target speed from the band and from whether the target is flying
//! against us (velocity dot product < 0) or away from us.
//!
//! | Band                     | Base speed                                  |
//! |--------------------------|---------------------------------------------|
//! | beyond far distance      | max velocity, unconditionally               |
//! | too close                | max velocity, unconditionally               |
//! | outside double optimal   | target speed, or max / 2 if target is slow  |
//! | outside optimal          | target speed, or max / 4 if target is slow  |
//! | inside optimal           | target speed, or min velocity if slow       |
//!
//! "Target speed" is clamped to `[min_velocity, max_velocity]`; "slow" means
//! below `min_velocity`. The three inner bands then multiply by the band's
//! positive or negative factor. The max / 2 vs max / 4 fallbacks are
//! deliberately asymmetric tuning.
//!
//! Outside-double-optimal also triggers when the target is further than
//! `braking_distance × brake_distance_factor`, so the planner speeds up
//! before a long approach instead of after it.

use serde::{Deserialize, Serialize};

use crate::kinematics;

/// Multipliers for one band, chosen by the sign of the velocity dot product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandMultiplier {
    /// Used when headings are aligned or perpendicular (dot ≥ 0).
    pub positive: f64,
    /// Used when headings oppose each other (dot < 0).
    pub negative: f64,
}

impl BandMultiplier {
    /// Create a multiplier pair.
    #[must_use]
    pub const fn new(positive: f64, negative: f64) -> Self {
        Self { positive, negative }
    }

    /// Pick the factor for a velocity dot product.
    #[must_use]
    pub fn select(self, velocity_dot: f64) -> f64 {
        if velocity_dot < 0.0 {
            self.negative
        } else {
            self.positive
        }
    }
}

/// Per-prefab velocity modifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityModifiers {
    /// Beyond this distance the construct always flies at max velocity.
    #[serde(default = "default_far_distance")]
    pub far_distance: f64,
    /// Closer than this the construct always flies at max velocity.
    #[serde(default = "default_too_close_distance")]
    pub too_close_distance: f64,
    /// Braking distance multiple beyond which the double-optimal band applies.
    #[serde(default = "default_brake_distance_factor")]
    pub brake_distance_factor: f64,
    /// Factors inside optimal range.
    #[serde(default = "default_inside_optimal")]
    pub inside_optimal_range: BandMultiplier,
    /// Factors between optimal and double optimal range.
    #[serde(default = "default_outside_optimal")]
    pub outside_optimal_range: BandMultiplier,
    /// Factors beyond double optimal range.
    #[serde(default = "default_outside_optimal_x2")]
    pub outside_optimal_range_x2: BandMultiplier,
}

impl Default for VelocityModifiers {
    fn default() -> Self {
        Self {
            far_distance: default_far_distance(),
            too_close_distance: default_too_close_distance(),
            brake_distance_factor: default_brake_distance_factor(),
            inside_optimal_range: default_inside_optimal(),
            outside_optimal_range: default_outside_optimal(),
            outside_optimal_range_x2: default_outside_optimal_x2(),
        }
    }
}

/// Immutable movement parameters taken from the prefab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementTuning {
    /// Slowest cruising speed (m/s).
    pub min_velocity: f64,
    /// Top speed (m/s).
    pub max_velocity: f64,
    /// Nominal thrust in g.
    pub acceleration_g: f64,
    /// Fraction of nominal thrust committed to braking, clamped to `[0.05, 1]`.
    pub realism_factor: f64,
    /// Band thresholds and multipliers.
    #[serde(default)]
    pub modifiers: VelocityModifiers,
}

/// Lowest realism factor honoured; below this braking would take forever.
pub const MIN_REALISM_FACTOR: f64 = 0.05;

impl MovementTuning {
    /// Build tuning from speeds in km/h, as prefabs are authored.
    ///
    /// A minimum above the maximum is lowered to the maximum.
    #[must_use]
    pub fn from_kph(
        min_kph: f64,
        max_kph: f64,
        acceleration_g: f64,
        realism_factor: f64,
        modifiers: VelocityModifiers,
    ) -> Self {
        let max_velocity = kinematics::kph_to_mps(max_kph).max(0.0);
        let min_velocity = kinematics::kph_to_mps(min_kph).clamp(0.0, max_velocity);
        Self {
            min_velocity,
            max_velocity,
            acceleration_g,
            realism_factor,
            modifiers,
        }
    }

    /// Nominal acceleration in m/s².
    #[must_use]
    pub fn acceleration(&self) -> f64 {
        kinematics::acceleration_from_g(self.acceleration_g)
    }

    /// Deceleration available for braking in m/s².
    #[must_use]
    pub fn braking_deceleration(&self) -> f64 {
        self.acceleration() * self.realism_factor.clamp(MIN_REALISM_FACTOR, 1.0)
    }

    /// Distance needed to stop from `speed` with this tuning.
    #[must_use]
    pub fn braking_distance(&self, speed: f64) -> f64 {
        kinematics::braking_distance(speed, self.braking_deceleration())
    }

    /// `speed` clamped to `[min_velocity, max_velocity]` without panicking
    /// on inverted bounds.
    #[must_use]
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        speed.max(self.min_velocity).min(self.max_velocity)
    }
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self::from_kph(500.0, 20_000.0, 5.0, 1.0, VelocityModifiers::default())
    }
}

/// Where the target sits relative to our engagement envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeBand {
    /// Closer than the too-close cutoff.
    TooClose,
    /// Within optimal range.
    InsideOptimal,
    /// Between optimal and double optimal range.
    OutsideOptimal,
    /// Beyond double optimal range, or far relative to braking distance.
    OutsideDoubleOptimal,
    /// Beyond the far-distance cutoff.
    BeyondEngagement,
}

impl RangeBand {
    /// Look-ahead horizon for target movement prediction in this band.
    #[must_use]
    pub fn prediction_seconds(self) -> f64 {
        match self {
            Self::BeyondEngagement | Self::OutsideDoubleOptimal => 10.0,
            Self::OutsideOptimal => 30.0,
            Self::InsideOptimal | Self::TooClose => 60.0,
        }
    }
}

/// Everything the planner needs from the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityInput {
    /// Distance to the target (metres).
    pub target_distance: f64,
    /// Optimal range from the weapon loadout (metres).
    pub optimal_range: f64,
    /// Target's own speed (m/s).
    pub target_speed: f64,
    /// Cosine between our heading and the target's heading.
    pub velocity_dot: f64,
    /// Our current braking distance (metres).
    pub braking_distance: f64,
}

/// Planner output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityPlan {
    /// The band the engagement was sorted into.
    pub band: RangeBand,
    /// Speed to fly at (m/s).
    pub velocity_goal: f64,
    /// Movement prediction horizon (seconds).
    pub prediction_seconds: f64,
}

/// Sort an engagement into its range band.
#[must_use]
pub fn classify_band(input: &VelocityInput, modifiers: &VelocityModifiers) -> RangeBand {
    let distance = input.target_distance;
    if distance > modifiers.far_distance {
        return RangeBand::BeyondEngagement;
    }
    if distance < modifiers.too_close_distance {
        return RangeBand::TooClose;
    }

    let beyond_braking = input.braking_distance > 0.0
        && distance > input.braking_distance * modifiers.brake_distance_factor;
    if distance > input.optimal_range * 2.0 || beyond_braking {
        RangeBand::OutsideDoubleOptimal
    } else if distance > input.optimal_range {
        RangeBand::OutsideOptimal
    } else {
        RangeBand::InsideOptimal
    }
}

/// Speed goal for a known band.
#[must_use]
pub fn band_velocity_goal(
    tuning: &MovementTuning,
    band: RangeBand,
    target_speed: f64,
    velocity_dot: f64,
) -> f64 {
    let m = &tuning.modifiers;
    let (fallback, multiplier) = match band {
        RangeBand::BeyondEngagement | RangeBand::TooClose => return tuning.max_velocity,
        RangeBand::OutsideDoubleOptimal => (tuning.max_velocity / 2.0, m.outside_optimal_range_x2),
        RangeBand::OutsideOptimal => (tuning.max_velocity / 4.0, m.outside_optimal_range),
        RangeBand::InsideOptimal => (tuning.min_velocity, m.inside_optimal_range),
    };

    let base = if target_speed < tuning.min_velocity {
        fallback
    } else {
        tuning.clamp_speed(target_speed)
    };
    base * multiplier.select(velocity_dot)
}

/// Classify the engagement and compute speed goal and prediction horizon.
#[must_use]
pub fn plan_velocity(tuning: &MovementTuning, input: &VelocityInput) -> VelocityPlan {
    let band = classify_band(input, &tuning.modifiers);
    VelocityPlan {
        band,
        velocity_goal: band_velocity_goal(tuning, band, input.target_speed, input.velocity_dot),
        prediction_seconds: band.prediction_seconds(),
    }
}

/// Shorthand for `plan_velocity(..).velocity_goal`.
#[must_use]
pub fn calculate_velocity_goal(tuning: &MovementTuning, input: &VelocityInput) -> f64 {
    plan_velocity(tuning, input).velocity_goal
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_far_distance() -> f64 {
    400_000.0
}
fn default_too_close_distance() -> f64 {
    1_000.0
}
fn default_brake_distance_factor() -> f64 {
    10.0
}
fn default_inside_optimal() -> BandMultiplier {
    BandMultiplier::new(1.0, 0.5)
}
fn default_outside_optimal() -> BandMultiplier {
    BandMultiplier::new(1.5, 1.0)
}
fn default_outside_optimal_x2() -> BandMultiplier {
    BandMultiplier::new(2.0, 1.5)
}
