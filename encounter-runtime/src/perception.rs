//! Perception frames: what a construct saw since the last tick.

use encounter_core::context::BehaviorContext;
use encounter_core::damage::DamageEntry;
use encounter_core::kinematics;
use encounter_core::types::{ConstructId, RadarContact, ShieldState};
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One delivery of perception data for a single construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionFrame {
    /// The construct that perceived this.
    pub construct_id: ConstructId,
    /// Own position.
    pub position: DVec3,
    /// Own orientation.
    pub rotation: DQuat,
    /// Own velocity.
    pub velocity: DVec3,
    /// Shield and core readings.
    pub shield: ShieldState,
    /// Complete radar scan; replaces the previous one.
    pub radar_contacts: Vec<RadarContact>,
    /// Damage taken since the previous frame.
    #[serde(default)]
    pub damage_events: Vec<DamageEntry>,
}

/// Apply `frame` to `ctx`, which last saw perception `elapsed` seconds ago.
/// If the current target is on radar its position, velocity and closing
/// geometry are refreshed as well.
pub fn apply_perception(ctx: &mut BehaviorContext, frame: PerceptionFrame, elapsed: f64) {
    let PerceptionFrame {
        construct_id,
        position,
        rotation,
        velocity,
        shield,
        radar_contacts,
        damage_events,
    } = frame;

    ctx.set_position(position);
    ctx.set_rotation(rotation);
    ctx.set_velocity(velocity);
    ctx.set_shield(shield);

    let damage_count = damage_events.len();
    for entry in damage_events {
        ctx.register_damage(entry);
    }
    ctx.update_radar_contacts(radar_contacts);

    track_target_from_radar(ctx, elapsed);

    trace!(
        construct = %construct_id,
        damage = damage_count,
        contacts = ctx.radar().len(),
        "perception applied"
    );
}

/// Refresh the target from the latest radar scan, taken `elapsed` seconds
/// after the previous sample. Radar gives positions only, so velocity is the
/// finite difference; without a positive `elapsed` the previous velocity is
/// kept. Returns `false` when there is no target or it is not on radar.
///
/// Call once per radar scan. A second call on the same scan sees no motion.
pub fn track_target_from_radar(ctx: &mut BehaviorContext, elapsed: f64) -> bool {
    let Some(contact) = ctx.target_construct_id().and_then(|id| ctx.radar().find(id)) else {
        return false;
    };
    let velocity = match ctx.target_position() {
        Some(previous) if elapsed > 0.0 => {
            kinematics::velocity_between(previous, contact.position, elapsed)
        }
        Some(_) => ctx.target_linear_velocity(),
        None => DVec3::ZERO,
    };
    ctx.set_target_position(contact.position, velocity);
    true
}

/// Start tracking a newly selected target from the current radar scan.
/// Leaves an existing track alone; returns whether a track was started.
pub fn acquire_target_from_radar(ctx: &mut BehaviorContext) -> bool {
    ctx.target_position().is_none() && track_target_from_radar(ctx, 0.0)
}
