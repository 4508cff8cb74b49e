//! Behavior steps run against each context on every region tick.
//!
//! A step is one slice of NPC behavior. The region skips a step for any
//! context whose matching [`BehaviorKind`] is deactivated.

use encounter_core::behavior::BehaviorKind;
use encounter_core::context::BehaviorContext;
use encounter_core::targeting::ThreatBasis;
use tracing::debug;

use crate::perception::acquire_target_from_radar;

/// One slice of behavior logic.
pub trait BehaviorStep: Send {
    /// Which activation flag gates this step.
    fn kind(&self) -> BehaviorKind;

    /// Advance `ctx` by one tick.
    fn step(&mut self, ctx: &mut BehaviorContext);
}

/// Retaliate against the top recent attacker, else let the radar effect pick.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectTargetStep;

impl BehaviorStep for SelectTargetStep {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::SelectTarget
    }

    fn step(&mut self, ctx: &mut BehaviorContext) {
        if !ctx.auto_select_attack_target_enabled() {
            return;
        }
        let before = ctx.target_construct_id();
        match ctx.assess_threat_at(chrono::Utc::now()) {
            Some(threat) if matches!(threat.basis, ThreatBasis::RecentDamage { .. }) => {
                ctx.set_target_construct_id(Some(threat.construct_id));
            }
            _ => {
                ctx.select_radar_target();
            }
        }
        if ctx.target_construct_id() != before {
            debug!(
                construct = %ctx.construct_id(),
                target = ?ctx.target_construct_id(),
                "target changed"
            );
        }
    }
}

/// Steer toward where the target will be.
///
/// Target motion comes from perception. This step only starts the track of
/// a target picked since the last frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct FollowTargetStep;

impl BehaviorStep for FollowTargetStep {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::FollowTarget
    }

    fn step(&mut self, ctx: &mut BehaviorContext) {
        acquire_target_from_radar(ctx);
        if !ctx.auto_target_move_position_enabled() {
            return;
        }
        if let Some(predicted) = ctx.predicted_target_position() {
            ctx.set_target_move_position(predicted);
        }
    }
}

/// Patrol the waypoint route while there is nothing to fight.
#[derive(Debug, Clone, Copy)]
pub struct WaypointStep {
    arrival_radius: f64,
}

impl WaypointStep {
    /// Waypoints count as reached within `arrival_radius` metres.
    #[must_use]
    pub fn new(arrival_radius: f64) -> Self {
        Self {
            arrival_radius: arrival_radius.max(0.0),
        }
    }
}

impl Default for WaypointStep {
    fn default() -> Self {
        Self::new(500.0)
    }
}

impl BehaviorStep for WaypointStep {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::WaypointMove
    }

    fn step(&mut self, ctx: &mut BehaviorContext) {
        if ctx.target_construct_id().is_some() {
            return;
        }
        let Some(position) = ctx.position() else {
            return;
        };
        let Some(next) = ctx.next_waypoint().map(|w| w.position) else {
            return;
        };
        if position.distance(next) <= self.arrival_radius {
            ctx.mark_waypoint_visited();
            if let Some(after) = ctx.next_waypoint().map(|w| w.position) {
                ctx.set_target_move_position(after);
            }
        } else {
            ctx.set_target_move_position(next);
        }
    }
}

/// The steps a combat NPC runs by default.
#[must_use]
pub fn default_steps() -> Vec<Box<dyn BehaviorStep>> {
    vec![
        Box::new(SelectTargetStep),
        Box::new(FollowTargetStep),
        Box::new(WaypointStep::default()),
    ]
}
