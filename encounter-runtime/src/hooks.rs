//! Integration hooks for the host game server.
//!
//! The free functions turn raw host callbacks (weapon impacts, radar sweeps)
//! into engine values. The structs are stand-in collaborators that only log,
//! for running a region before the real scripting and player services are
//! wired up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use encounter_core::damage::DamageEntry;
use encounter_core::error::{EncounterError, Result};
use encounter_core::notify::{
    Collaborators, ConstructLookup, EventKind, PlayerDefeatedNpc, PlayerEventSink, ReactionHook,
    ScriptContext,
};
use encounter_core::types::{ConstructId, ConstructInfo, PlayerId, RadarContact};
use glam::DVec3;
use std::sync::Arc;
use tracing::{debug, info};

/// Build a damage entry from the host's weapon-impact callback.
#[must_use]
pub fn on_weapon_impact(
    source: ConstructId,
    player: PlayerId,
    damage: f64,
    timestamp: DateTime<Utc>,
) -> DamageEntry {
    DamageEntry {
        source_construct_id: source,
        player_id: player,
        damage: damage.max(0.0),
        timestamp,
    }
}

/// Build radar contacts from a sweep of `(construct, position)` pairs as seen
/// from `own_position`. Contacts come back ordered nearest first.
#[must_use]
pub fn on_radar_scan(own_position: DVec3, sweep: &[(ConstructId, DVec3)]) -> Vec<RadarContact> {
    let mut contacts: Vec<RadarContact> = sweep
        .iter()
        .map(|&(id, position)| RadarContact::new(id, position, own_position.distance(position)))
        .collect();
    contacts.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    contacts
}

// ---------------------------------------------------------------------------
// Logging collaborators
// ---------------------------------------------------------------------------

/// Reaction hook that logs every event it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReactionHook;

#[async_trait]
impl ReactionHook for LoggingReactionHook {
    async fn execute(&self, event: &EventKind, context: &ScriptContext) -> Result<()> {
        info!(
            event = %event,
            construct = %context.construct_id,
            faction = %context.faction_id,
            players = context.player_ids.len(),
            "reaction"
        );
        Ok(())
    }
}

/// Player event sink that logs defeat notices.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPlayerEventSink;

#[async_trait]
impl PlayerEventSink for LoggingPlayerEventSink {
    async fn player_defeated_npc(&self, event: PlayerDefeatedNpc) -> Result<()> {
        info!(
            player = %event.player_id,
            construct = %event.construct_id,
            faction = %event.faction_id,
            player_count = event.player_count,
            "player defeated npc"
        );
        Ok(())
    }
}

/// Construct lookup with no backing store. Every lookup fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnresolvedConstructLookup;

#[async_trait]
impl ConstructLookup for UnresolvedConstructLookup {
    async fn construct_info_uncached(&self, construct_id: ConstructId) -> Result<ConstructInfo> {
        debug!(construct = %construct_id, "construct lookup unavailable");
        Err(EncounterError::Lookup {
            construct: construct_id,
            reason: "no construct service configured".into(),
        })
    }
}

/// Collaborators made of the logging stand-ins above.
#[must_use]
pub fn logging_collaborators() -> Collaborators {
    Collaborators {
        reactions: Arc::new(LoggingReactionHook),
        constructs: Arc::new(UnresolvedConstructLookup),
        players: Arc::new(LoggingPlayerEventSink),
    }
}
