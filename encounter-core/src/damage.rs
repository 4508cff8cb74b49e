//! Damage history ledger: who has been hurting this construct, and when.
//!
//! The ledger is a time-bounded multiset of inbound damage events. Writes
//! take the write lock, build a pruned copy with the new entry appended and
//! swap it in, so the stored set never holds more than the history window
//! worth of combat. Reads clone the current `Arc` and filter outside the
//! lock; entries older than the history window are excluded from every
//! query even when a later write has not pruned them yet.
//!
//! Weapon-impact handling records into the ledger from outside the tick
//! thread, so every method takes `&self`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::DamageConfig;
use crate::targeting::{self, ThreatScore};
use crate::types::{ConstructId, PlayerId};

/// One inbound damage event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageEntry {
    /// Construct that fired.
    pub source_construct_id: ConstructId,
    /// Player credited with the shot.
    pub player_id: PlayerId,
    /// Damage dealt.
    pub damage: f64,
    /// When the damage landed.
    pub timestamp: DateTime<Utc>,
}

impl DamageEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn now(source_construct_id: ConstructId, player_id: PlayerId, damage: f64) -> Self {
        Self {
            source_construct_id,
            player_id,
            damage,
            timestamp: Utc::now(),
        }
    }
}

/// Time-pruned damage history for a single construct.
#[derive(Debug)]
pub struct DamageLedger {
    entries: RwLock<Arc<Vec<DamageEntry>>>,
    history_window: Duration,
    threat_window: Duration,
}

impl Default for DamageLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DamageLedger {
    /// Create a ledger with the default 10 minute history and 1 minute
    /// threat windows.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&DamageConfig::default())
    }

    /// Create a ledger with configured windows.
    #[must_use]
    pub fn with_config(config: &DamageConfig) -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            history_window: config.history_window(),
            threat_window: config.threat_window(),
        }
    }

    /// The window outside of which entries are ignored.
    #[must_use]
    pub fn history_window(&self) -> Duration {
        self.history_window
    }

    /// The window used for threat ranking.
    #[must_use]
    pub fn threat_window(&self) -> Duration {
        self.threat_window
    }

    /// Append an entry and compact the ledger to the history window.
    pub fn record_damage(&self, entry: DamageEntry) {
        self.record_damage_at(entry, Utc::now());
    }

    /// [`record_damage`](Self::record_damage) with an explicit clock reading.
    pub fn record_damage_at(&self, entry: DamageEntry, now: DateTime<Utc>) {
        let cutoff = now - self.history_window;
        let mut guard = self.entries.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().copied());
        next.push(entry);
        next.retain(|e| e.timestamp >= cutoff);
        *guard = Arc::new(next);
    }

    /// The stored entries as of the last write, unfiltered.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<DamageEntry>> {
        Arc::clone(&self.entries.read())
    }

    /// Number of stored entries, including any not yet pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been recorded inside the history window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Entries within `window` of `now`, capped to the history window,
    /// in insertion order.
    #[must_use]
    pub fn recent_damage_at(&self, window: Duration, now: DateTime<Utc>) -> Vec<DamageEntry> {
        let cutoff = now - window.min(self.history_window);
        self.snapshot()
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .copied()
            .collect()
    }

    /// [`recent_damage_at`](Self::recent_damage_at) relative to the current time.
    #[must_use]
    pub fn recent_damage(&self, window: Duration) -> Vec<DamageEntry> {
        self.recent_damage_at(window, Utc::now())
    }

    /// Sum of all damage inside the history window.
    #[must_use]
    pub fn total_damage_at(&self, now: DateTime<Utc>) -> f64 {
        self.recent_damage_at(self.history_window, now)
            .iter()
            .map(|e| e.damage)
            .sum()
    }

    /// [`total_damage_at`](Self::total_damage_at) relative to the current time.
    #[must_use]
    pub fn total_damage(&self) -> f64 {
        self.total_damage_at(Utc::now())
    }

    /// Damage inside the history window summed per player.
    #[must_use]
    pub fn total_damage_by_player_at(&self, now: DateTime<Utc>) -> HashMap<PlayerId, f64> {
        let mut totals = HashMap::new();
        for entry in self.recent_damage_at(self.history_window, now) {
            *totals.entry(entry.player_id).or_insert(0.0) += entry.damage;
        }
        totals
    }

    /// [`total_damage_by_player_at`](Self::total_damage_by_player_at)
    /// relative to the current time.
    #[must_use]
    pub fn total_damage_by_player(&self) -> HashMap<PlayerId, f64> {
        self.total_damage_by_player_at(Utc::now())
    }

    /// Every player credited with damage inside the history window.
    #[must_use]
    pub fn attacking_players_at(&self, now: DateTime<Utc>) -> BTreeSet<PlayerId> {
        self.recent_damage_at(self.history_window, now)
            .iter()
            .map(|e| e.player_id)
            .collect()
    }

    /// Source constructs ranked by damage dealt inside the threat window.
    #[must_use]
    pub fn threat_scores_at(&self, now: DateTime<Utc>) -> Vec<ThreatScore> {
        targeting::rank_threats(&self.recent_damage_at(self.threat_window, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    fn hit(src: u64, player: u64, damage: f64, at: DateTime<Utc>) -> DamageEntry {
        DamageEntry {
            source_construct_id: ConstructId(src),
            player_id: PlayerId(player),
            damage,
            timestamp: at,
        }
    }

    #[test]
    fn total_is_sum_inside_window() {
        let ledger = DamageLedger::new();
        let now = t0();
        ledger.record_damage_at(hit(1, 10, 5.0, now - Duration::minutes(9)), now);
        ledger.record_damage_at(hit(2, 20, 7.5, now - Duration::seconds(1)), now);
        assert!((ledger.total_damage_at(now) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn write_compacts_old_entries() {
        let ledger = DamageLedger::new();
        ledger.record_damage_at(hit(1, 10, 5.0, t0()), t0());
        let later = t0() + Duration::minutes(11);
        ledger.record_damage_at(hit(2, 20, 1.0, later), later);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.snapshot()[0].source_construct_id, ConstructId(2));
    }

    #[test]
    fn queries_exclude_stale_entries_without_a_write() {
        let ledger = DamageLedger::new();
        ledger.record_damage_at(hit(1, 10, 5.0, t0()), t0());
        let later = t0() + Duration::minutes(10) + Duration::seconds(1);
        assert!(ledger.total_damage_at(later).abs() < f64::EPSILON);
        // Still physically present until the next write.
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn recent_damage_respects_window() {
        let ledger = DamageLedger::new();
        let now = t0();
        ledger.record_damage_at(hit(1, 10, 1.0, now - Duration::seconds(90)), now);
        ledger.record_damage_at(hit(2, 10, 1.0, now - Duration::seconds(30)), now);
        let recent = ledger.recent_damage_at(Duration::minutes(1), now);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].source_construct_id, ConstructId(2));
    }

    #[test]
    fn totals_by_player() {
        let ledger = DamageLedger::new();
        let now = t0();
        ledger.record_damage_at(hit(1, 10, 3.0, now), now);
        ledger.record_damage_at(hit(1, 10, 4.0, now), now);
        ledger.record_damage_at(hit(2, 20, 1.0, now), now);
        let by_player = ledger.total_damage_by_player_at(now);
        assert!((by_player[&PlayerId(10)] - 7.0).abs() < 1e-9);
        assert!((by_player[&PlayerId(20)] - 1.0).abs() < 1e-9);
        assert_eq!(ledger.attacking_players_at(now).len(), 2);
    }

    #[test]
    fn concurrent_writers_never_lose_entries() {
        let ledger = DamageLedger::new();
        let now = Utc::now();
        std::thread::scope(|s| {
            for worker in 0..4_u64 {
                let ledger = &ledger;
                s.spawn(move || {
                    for _ in 0..250 {
                        ledger.record_damage(hit(worker, worker, 1.0, now));
                    }
                });
            }
        });
        assert_eq!(ledger.len(), 1_000);
        assert!((ledger.total_damage() - 1_000.0).abs() < 1e-9);
    }
}
