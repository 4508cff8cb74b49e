//! Core type definitions for the encounter engine.
//!
//! Construct, player and faction identifiers live in distinct namespaces,
//! so each gets its own newtype even though two of them wrap a `u64`.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Opaque identifier of a construct (ship or station).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstructId(pub u64);

/// Identifier of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

/// Identifier of an organization that can own constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub u64);

/// Identifier of an NPC faction. Signed, unlike construct and player ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionId(pub i64);

/// Identifier of a territory an encounter may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerritoryId(pub Uuid);

impl TerritoryId {
    /// Create a new random territory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TerritoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConstructId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TerritoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// Who owns a construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OwnerId {
    /// Owned by a single player.
    Player(PlayerId),
    /// Owned by an organization; no single player is attributable.
    Organization(OrganizationId),
}

impl OwnerId {
    /// The owning player, if the owner is a player.
    #[must_use]
    pub fn player(self) -> Option<PlayerId> {
        match self {
            Self::Player(id) => Some(id),
            Self::Organization(_) => None,
        }
    }
}

/// Live construct information as returned by an uncached lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructInfo {
    /// The construct this describes.
    pub construct_id: ConstructId,
    /// Player currently seated at the controls, if any.
    pub pilot: Option<PlayerId>,
    /// Owner of record.
    pub owner: OwnerId,
}

// ---------------------------------------------------------------------------
// Perception
// ---------------------------------------------------------------------------

/// A construct seen on radar during the latest scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarContact {
    /// Identity of the contact.
    pub construct_id: ConstructId,
    /// Last reported position in world space (metres).
    pub position: DVec3,
    /// Distance from the scanning construct (metres).
    pub distance: f64,
}

impl RadarContact {
    /// Create a contact from an id, position and distance.
    #[must_use]
    pub fn new(construct_id: ConstructId, position: DVec3, distance: f64) -> Self {
        Self {
            construct_id,
            position,
            distance,
        }
    }
}

/// Shield and core readings for the controlled construct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShieldState {
    /// Remaining shield hit points as a fraction of the maximum (0–1).
    pub shield_ratio: f64,
    /// Whether the shield is currently down (venting or depleted).
    pub shield_down: bool,
    /// Core unit stress as a fraction of the destruction threshold (0–1).
    pub core_stress_ratio: f64,
}

impl ShieldState {
    /// Full shields, unstressed core.
    pub const PRISTINE: Self = Self {
        shield_ratio: 1.0,
        shield_down: false,
        core_stress_ratio: 0.0,
    };
}

impl Default for ShieldState {
    fn default() -> Self {
        Self::PRISTINE
    }
}
