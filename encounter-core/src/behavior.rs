//! Behavior kinds and their activation table.
//!
//! Behaviors are switched off by kind and queried by kind. The table is a
//! fixed array indexed by [`BehaviorKind`], so checking a flag on the tick
//! path is a bounds-checked load with no hashing or string keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every behavior a construct can run during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// Checks hull/core state and raises destruction.
    Alive,
    /// Picks a radar contact to target.
    SelectTarget,
    /// Steers toward the target's predicted position.
    FollowTarget,
    /// Fires weapons at the target.
    Aggressive,
    /// Flies the waypoint route.
    WaypointMove,
    /// Turns shield/core readings into lifecycle events.
    Notifier,
    /// Keeps a destroyed construct around as a lootable wreck.
    Wreck,
}

impl BehaviorKind {
    /// Every kind, in table order.
    pub const ALL: [Self; 7] = [
        Self::Alive,
        Self::SelectTarget,
        Self::FollowTarget,
        Self::Aggressive,
        Self::WaypointMove,
        Self::Notifier,
        Self::Wreck,
    ];

    /// Number of kinds.
    pub const COUNT: usize = Self::ALL.len();

    /// Slot of this kind in an [`ActivationTable`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::SelectTarget => "select_target",
            Self::FollowTarget => "follow_target",
            Self::Aggressive => "aggressive",
            Self::WaypointMove => "waypoint_move",
            Self::Notifier => "notifier",
            Self::Wreck => "wreck",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// On/off switch per behavior kind. Everything starts active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationTable {
    active: [bool; BehaviorKind::COUNT],
}

impl Default for ActivationTable {
    fn default() -> Self {
        Self {
            active: [true; BehaviorKind::COUNT],
        }
    }
}

impl ActivationTable {
    /// All behaviors active.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch `kind` off.
    pub fn deactivate(&mut self, kind: BehaviorKind) {
        self.active[kind.index()] = false;
    }

    /// Switch `kind` back on.
    pub fn activate(&mut self, kind: BehaviorKind) {
        self.active[kind.index()] = true;
    }

    /// Whether `kind` should run.
    #[must_use]
    pub fn is_active(&self, kind: BehaviorKind) -> bool {
        self.active[kind.index()]
    }

    /// Kinds currently active, in table order.
    pub fn active_kinds(&self) -> impl Iterator<Item = BehaviorKind> + '_ {
        BehaviorKind::ALL.into_iter().filter(|k| self.is_active(*k))
    }
}
