//! Kinematics: pure motion formulas used by the velocity planner.
//!
//! Constant-acceleration model:
//!   d_brake = v² / (2a)
//!   t_brake = v / a
//!   d       = v₀t + ½at²   →   t = (−v₀ + √(v₀² + 2ad)) / a
//!
//! All functions are total: a non-positive acceleration yields
//! `f64::INFINITY` for "how long / how far" questions instead of dividing
//! by zero, and a non-positive time step yields a zero vector.

use glam::DVec3;

/// Standard gravity in m/s², used to turn configured g-loads into m/s².
pub const STANDARD_GRAVITY: f64 = 9.806_65;

/// Convert kilometres per hour to metres per second.
#[must_use]
pub fn kph_to_mps(kph: f64) -> f64 {
    kph / 3.6
}

/// Convert a g-load to an acceleration in m/s². Negative loads clamp to 0.
#[must_use]
pub fn acceleration_from_g(acceleration_g: f64) -> f64 {
    (acceleration_g * STANDARD_GRAVITY).max(0.0)
}

/// Distance needed to decelerate from `speed` to a standstill.
#[must_use]
pub fn braking_distance(speed: f64, deceleration: f64) -> f64 {
    let speed = speed.abs();
    if speed == 0.0 {
        return 0.0;
    }
    if deceleration <= 0.0 {
        return f64::INFINITY;
    }
    speed * speed / (2.0 * deceleration)
}

/// Time needed to decelerate from `speed` to a standstill.
#[must_use]
pub fn braking_time(speed: f64, deceleration: f64) -> f64 {
    time_to_reach_velocity(speed.abs(), 0.0, deceleration)
}

/// Time needed to change speed from `current` to `target`.
#[must_use]
pub fn time_to_reach_velocity(current: f64, target: f64, acceleration: f64) -> f64 {
    let delta = (target - current).abs();
    if delta == 0.0 {
        return 0.0;
    }
    if acceleration <= 0.0 {
        return f64::INFINITY;
    }
    delta / acceleration
}

/// Time needed to cover `distance` starting at `initial_speed` while
/// accelerating at `acceleration`.
///
/// Without acceleration this degrades to `distance / initial_speed`.
#[must_use]
pub fn time_to_reach_distance(distance: f64, initial_speed: f64, acceleration: f64) -> f64 {
    let distance = distance.abs();
    if distance == 0.0 {
        return 0.0;
    }
    if acceleration <= 0.0 {
        return if initial_speed > 0.0 {
            distance / initial_speed
        } else {
            f64::INFINITY
        };
    }
    let discriminant = initial_speed * initial_speed + 2.0 * acceleration * distance;
    (-initial_speed + discriminant.max(0.0).sqrt()) / acceleration
}

/// Finite-difference velocity between two sampled positions.
#[must_use]
pub fn velocity_between(previous: DVec3, current: DVec3, dt: f64) -> DVec3 {
    if dt <= 0.0 {
        return DVec3::ZERO;
    }
    (current - previous) / dt
}

/// Finite-difference acceleration between two sampled velocities.
#[must_use]
pub fn acceleration_between(previous: DVec3, current: DVec3, dt: f64) -> DVec3 {
    velocity_between(previous, current, dt)
}

/// Extrapolate a position `seconds` ahead under constant acceleration.
#[must_use]
pub fn predict_position(position: DVec3, velocity: DVec3, acceleration: DVec3, seconds: f64) -> DVec3 {
    position + velocity * seconds + acceleration * (0.5 * seconds * seconds)
}

/// Cosine of the angle between two headings.
///
/// Negative means the vectors oppose each other (head-on); returns 0 when
/// either vector has no direction.
#[must_use]
pub fn heading_alignment(a: DVec3, b: DVec3) -> f64 {
    let (a, b) = (a.normalize_or_zero(), b.normalize_or_zero());
    a.dot(b)
}
