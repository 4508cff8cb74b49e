//! Weapon-impact routing into per-construct damage ledgers.
//!
//! Impacts arrive on host threads, not the tick. The router holds a handle
//! on every live NPC's ledger so they can be written without touching the
//! behavior context.

use std::sync::Arc;

use dashmap::DashMap;
use encounter_core::damage::{DamageEntry, DamageLedger};
use encounter_core::metrics::EncounterCounters;
use encounter_core::types::ConstructId;
use tracing::trace;

/// Routes damage to the ledger of the construct that was hit.
#[derive(Debug)]
pub struct DamageRouter {
    ledgers: DashMap<ConstructId, Arc<DamageLedger>>,
    counters: Arc<EncounterCounters>,
}

impl DamageRouter {
    /// Empty router reporting into `counters`.
    #[must_use]
    pub fn new(counters: Arc<EncounterCounters>) -> Self {
        Self {
            ledgers: DashMap::new(),
            counters,
        }
    }

    /// Start routing damage for `construct_id`.
    pub fn register(&self, construct_id: ConstructId, ledger: Arc<DamageLedger>) {
        self.ledgers.insert(construct_id, ledger);
    }

    /// Stop routing damage for `construct_id`.
    pub fn unregister(&self, construct_id: ConstructId) {
        self.ledgers.remove(&construct_id);
    }

    /// Record `entry` against `target`. Returns `false` when `target` is not
    /// a registered NPC.
    pub fn route(&self, target: ConstructId, entry: DamageEntry) -> bool {
        let Some(ledger) = self.ledgers.get(&target).map(|l| Arc::clone(l.value())) else {
            trace!(target = %target, source = %entry.source_construct_id, "impact on unknown construct");
            return false;
        };
        ledger.record_damage(entry);
        EncounterCounters::bump(&self.counters.damage_recorded);
        true
    }

    /// Registered constructs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}
