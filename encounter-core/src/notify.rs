//! Lifecycle event notification: at-most-once delivery to scripted reactions.
//!
//! Every named event moves through a small state machine per construct:
//!
//! ```text
//! NotPublished ──claim──▶ Dispatching ──ok──▶ Published (terminal)
//!       ▲                      │
//!       └──── error/interrupt ─┘
//! ```
//!
//! Claiming is a single `DashMap` entry operation, so two callers racing on
//! the same event cannot both dispatch it. A dispatch that fails or is cut
//! short by shutdown releases the claim; one that succeeds can never be
//! repeated for the lifetime of the construct.
//!
//! Destruction carries extra work: if no player is attributed, the last
//! known target is resolved through an uncached lookup (pilot first, then a
//! player owner). Defeated-player events then go out concurrently with the
//! scripted reaction.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::NotificationConfig;
use crate::error::Result;
use crate::metrics::{EncounterCounters, spans};
use crate::types::{ConstructId, FactionId, OwnerId, PlayerId, ShieldState, TerritoryId};

// ---------------------------------------------------------------------------
// Events and state
// ---------------------------------------------------------------------------

/// A lifecycle event that fires at most once per construct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The construct was destroyed.
    ConstructDestroyed,
    /// Shield dropped to half.
    ShieldHalf,
    /// Shield dropped to the low threshold.
    ShieldLow,
    /// Shield went down.
    ShieldDown,
    /// Core stress crossed the high threshold.
    CoreStressHigh,
    /// Prefab-defined event.
    Custom(String),
}

impl EventKind {
    /// Name the scripting layer knows the event by.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ConstructDestroyed => "OnDestruction",
            Self::ShieldHalf => "OnShieldHalfAction",
            Self::ShieldLow => "OnShieldLowAction",
            Self::ShieldDown => "OnShieldDownAction",
            Self::CoreStressHigh => "OnCoreStressHigh",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Publication state of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishState {
    /// Not delivered yet; may be claimed.
    #[default]
    NotPublished,
    /// Claimed by a dispatch in flight.
    Dispatching,
    /// Delivered. Terminal.
    Published,
}

/// Outcome of a [`EventNotifier::notify`] call that did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// This call delivered the event.
    Delivered,
    /// The event was already published or being published.
    Suppressed,
    /// Shutdown cut the dispatch short; the event may be retried.
    Interrupted,
}

impl ShieldState {
    /// Lifecycle events the current readings call for, in severity order.
    #[must_use]
    pub fn due_events(&self, thresholds: &NotificationConfig) -> Vec<EventKind> {
        let mut due = Vec::new();
        if self.shield_ratio <= thresholds.shield_half_ratio {
            due.push(EventKind::ShieldHalf);
        }
        if self.shield_ratio <= thresholds.shield_low_ratio {
            due.push(EventKind::ShieldLow);
        }
        if self.shield_down {
            due.push(EventKind::ShieldDown);
        }
        if self.core_stress_ratio >= thresholds.core_stress_high_ratio {
            due.push(EventKind::CoreStressHigh);
        }
        due
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Snapshot of the construct handed to the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventArgs {
    /// The construct the event is about.
    pub construct_id: ConstructId,
    /// Its faction.
    pub faction_id: FactionId,
    /// Position of the sector the construct is in.
    pub sector: DVec3,
    /// Territory the encounter is bound to, if any.
    pub territory_id: Option<TerritoryId>,
    /// Players attributed through damage.
    pub player_ids: BTreeSet<PlayerId>,
    /// Last construct targeted, used for destruction attribution.
    pub last_target: Option<ConstructId>,
}

/// Immutable context passed to a scripted reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptContext {
    /// Faction of the construct.
    pub faction_id: FactionId,
    /// Players involved.
    pub player_ids: BTreeSet<PlayerId>,
    /// Sector position.
    pub sector: DVec3,
    /// Territory, if any.
    pub territory_id: Option<TerritoryId>,
    /// The construct itself.
    pub construct_id: ConstructId,
}

impl ScriptContext {
    fn from_args(args: &EventArgs, player_ids: BTreeSet<PlayerId>) -> Self {
        Self {
            faction_id: args.faction_id,
            player_ids,
            sector: args.sector,
            territory_id: args.territory_id,
            construct_id: args.construct_id,
        }
    }
}

/// Player-facing record of an NPC kill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerDefeatedNpc {
    /// The player credited.
    pub player_id: PlayerId,
    /// Sector position where it happened.
    pub sector: DVec3,
    /// The NPC construct.
    pub construct_id: ConstructId,
    /// The NPC's faction.
    pub faction_id: FactionId,
    /// How many players share the kill.
    pub player_count: usize,
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// The external action-script executor.
#[async_trait]
pub trait ReactionHook: Send + Sync {
    /// Run the reaction bound to `event`. May be called concurrently for
    /// different events of the same construct.
    async fn execute(&self, event: &EventKind, context: &ScriptContext) -> Result<()>;
}

/// Live construct information, bypassing any cache.
#[async_trait]
pub trait ConstructLookup: Send + Sync {
    /// Fetch pilot and owner of `construct_id`.
    async fn construct_info_uncached(
        &self,
        construct_id: ConstructId,
    ) -> Result<crate::types::ConstructInfo>;
}

/// Publishes player-directed consequences of a destruction.
#[async_trait]
pub trait PlayerEventSink: Send + Sync {
    /// Record that a player defeated an NPC.
    async fn player_defeated_npc(&self, event: PlayerDefeatedNpc) -> Result<()>;
}

/// Everything the notifier talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Scripted reactions.
    pub reactions: Arc<dyn ReactionHook>,
    /// Pilot/owner resolution.
    pub constructs: Arc<dyn ConstructLookup>,
    /// Player event publication.
    pub players: Arc<dyn PlayerEventSink>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Fires the shutdown signal.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    /// Signal every [`ShutdownSignal`] cloned from this channel.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// Observes shutdown. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Receiver<bool>);

/// A connected trigger/signal pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), ShutdownSignal(rx))
}

impl ShutdownSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self(rx)
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once shutdown is requested. Pends forever if the trigger is
    /// dropped without firing.
    pub async fn triggered(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Delay before the first retry of a failed event.
pub const RETRY_BASE_SECS: i64 = 1;
/// Longest delay between retries.
pub const RETRY_MAX_SECS: i64 = 60;

/// Failure history of one event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
    /// Consecutive failed dispatches.
    pub failures: u32,
    /// Scheduled retries wait until this instant.
    pub not_before: DateTime<Utc>,
}

impl RetryBackoff {
    fn after_failure(previous: Option<Self>, now: DateTime<Utc>) -> Self {
        let failures = previous.map_or(0, |b| b.failures).saturating_add(1);
        let exponent = failures.saturating_sub(1).min(16);
        let delay = RETRY_BASE_SECS.saturating_mul(1_i64 << exponent).min(RETRY_MAX_SECS);
        Self {
            failures,
            not_before: now + TimeDelta::seconds(delay),
        }
    }
}

/// Per-construct once-only event dispatcher. Clones share state.
#[derive(Clone)]
pub struct EventNotifier {
    construct_id: ConstructId,
    states: Arc<DashMap<EventKind, PublishState>>,
    backoff: Arc<DashMap<EventKind, RetryBackoff>>,
    collaborators: Collaborators,
    counters: Arc<EncounterCounters>,
    shutdown: ShutdownSignal,
}

impl fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotifier")
            .field("construct_id", &self.construct_id)
            .field("events", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// Releases a claim unless the dispatch committed.
struct ClaimGuard<'a> {
    states: &'a DashMap<EventKind, PublishState>,
    kind: &'a EventKind,
    committed: bool,
}

impl ClaimGuard<'_> {
    fn commit(mut self) {
        self.states.insert(self.kind.clone(), PublishState::Published);
        self.committed = true;
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.states.insert(self.kind.clone(), PublishState::NotPublished);
        }
    }
}

impl EventNotifier {
    /// Notifier for `construct_id`.
    #[must_use]
    pub fn new(
        construct_id: ConstructId,
        collaborators: Collaborators,
        counters: Arc<EncounterCounters>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            construct_id,
            states: Arc::new(DashMap::new()),
            backoff: Arc::new(DashMap::new()),
            collaborators,
            counters,
            shutdown,
        }
    }

    /// Current state of `kind`.
    #[must_use]
    pub fn state(&self, kind: &EventKind) -> PublishState {
        self.states.get(kind).map_or(PublishState::NotPublished, |s| *s)
    }

    /// Whether `kind` has been delivered.
    #[must_use]
    pub fn is_published(&self, kind: &EventKind) -> bool {
        self.state(kind) == PublishState::Published
    }

    /// Failure history of `kind`, if its last dispatch failed.
    #[must_use]
    pub fn backoff(&self, kind: &EventKind) -> Option<RetryBackoff> {
        self.backoff.get(kind).map(|b| *b)
    }

    /// Whether a scheduler may dispatch `kind` at `now`. Direct
    /// [`notify`](Self::notify) calls are not held back.
    #[must_use]
    pub fn retry_ready_at(&self, kind: &EventKind, now: DateTime<Utc>) -> bool {
        self.backoff.get(kind).is_none_or(|b| now >= b.not_before)
    }

    fn try_claim(&self, kind: &EventKind) -> bool {
        match self.states.entry(kind.clone()) {
            Entry::Occupied(mut e) => {
                if *e.get() == PublishState::NotPublished {
                    e.insert(PublishState::Dispatching);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(v) => {
                v.insert(PublishState::Dispatching);
                true
            }
        }
    }

    /// Deliver `kind` unless it was already delivered or is in flight.
    ///
    /// # Errors
    /// Returns the reaction hook's error; the event is released and a
    /// later call may retry it.
    pub async fn notify(&self, kind: EventKind, args: &EventArgs) -> Result<Delivery> {
        if !self.try_claim(&kind) {
            EncounterCounters::bump(&self.counters.notifications_suppressed);
            debug!(construct = %self.construct_id, event = %kind, "event already published");
            return Ok(Delivery::Suppressed);
        }
        let guard = ClaimGuard {
            states: &self.states,
            kind: &kind,
            committed: false,
        };

        let span = info_span!(spans::NOTIFY, construct = %self.construct_id, event = %kind);
        let mut shutdown = self.shutdown.clone();
        let outcome = tokio::select! {
            biased;
            () = shutdown.triggered() => None,
            res = self.dispatch(&kind, args).instrument(span) => Some(res),
        };

        match outcome {
            None => {
                warn!(construct = %self.construct_id, event = %kind, "dispatch interrupted by shutdown");
                Ok(Delivery::Interrupted)
            }
            Some(Err(e)) => {
                EncounterCounters::bump(&self.counters.notifications_failed);
                let backoff = RetryBackoff::after_failure(self.backoff(&kind), Utc::now());
                self.backoff.insert(kind.clone(), backoff);
                error!(
                    construct = %self.construct_id,
                    event = %kind,
                    error = %e,
                    failures = backoff.failures,
                    retry_at = %backoff.not_before,
                    "reaction failed"
                );
                Err(e)
            }
            Some(Ok(())) => {
                self.backoff.remove(&kind);
                guard.commit();
                EncounterCounters::bump(&self.counters.notifications_delivered);
                info!(construct = %self.construct_id, event = %kind, "event published");
                Ok(Delivery::Delivered)
            }
        }
    }

    async fn dispatch(&self, kind: &EventKind, args: &EventArgs) -> Result<()> {
        if *kind == EventKind::ConstructDestroyed {
            return self.dispatch_destroyed(kind, args).await;
        }
        let context = ScriptContext::from_args(args, args.player_ids.clone());
        self.collaborators.reactions.execute(kind, &context).await
    }

    async fn dispatch_destroyed(&self, kind: &EventKind, args: &EventArgs) -> Result<()> {
        let mut players = args.player_ids.clone();
        if players.is_empty() {
            let span = info_span!(spans::ATTRIBUTION, construct = %self.construct_id);
            if let Some(player) = self.attribute_destruction(args).instrument(span).await {
                players.insert(player);
            }
        }

        let player_count = players.len();
        let sink = &self.collaborators.players;
        let fan_out = players.iter().map(|&player_id| {
            let event = PlayerDefeatedNpc {
                player_id,
                sector: args.sector,
                construct_id: args.construct_id,
                faction_id: args.faction_id,
                player_count,
            };
            async move {
                if let Err(e) = sink.player_defeated_npc(event).await {
                    warn!(player = %player_id, error = %e, "failed to publish defeated-npc event");
                }
            }
        });

        let context = ScriptContext::from_args(args, players.clone());
        let (reaction, _) = tokio::join!(
            self.collaborators.reactions.execute(kind, &context),
            join_all(fan_out)
        );
        reaction
    }

    /// Best-effort killer attribution from the last target.
    async fn attribute_destruction(&self, args: &EventArgs) -> Option<PlayerId> {
        let target = args.last_target?;
        EncounterCounters::bump(&self.counters.attribution_fallbacks);

        let info = match self.collaborators.constructs.construct_info_uncached(target).await {
            Ok(info) => info,
            Err(e) => {
                EncounterCounters::bump(&self.counters.attribution_failures);
                warn!(target = %target, error = %e, "attribution lookup failed");
                return None;
            }
        };

        if let Some(pilot) = info.pilot {
            debug!(target = %target, player = %pilot, "attributed to pilot");
            return Some(pilot);
        }
        match info.owner {
            OwnerId::Player(owner) => {
                debug!(target = %target, player = %owner, "attributed to owner");
                Some(owner)
            }
            OwnerId::Organization(org) => {
                error!(target = %target, organization = %org, "destroyed by organization-owned construct, no player attributed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EncounterError;
    use crate::types::{ConstructInfo, OrganizationId};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingHook {
        calls: AtomicUsize,
        fail_first: AtomicUsize,
        contexts: Mutex<Vec<ScriptContext>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ReactionHook for CountingHook {
        async fn execute(&self, event: &EventKind, context: &ScriptContext) -> Result<()> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.contexts.lock().push(context.clone());
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(EncounterError::Reaction {
                    event: event.name().to_owned(),
                    reason: "script error".into(),
                });
            }
            Ok(())
        }
    }

    struct FixedLookup(Result<ConstructInfo>);

    #[async_trait]
    impl ConstructLookup for FixedLookup {
        async fn construct_info_uncached(&self, construct_id: ConstructId) -> Result<ConstructInfo> {
            match &self.0 {
                Ok(info) => Ok(*info),
                Err(_) => Err(EncounterError::Lookup {
                    construct: construct_id,
                    reason: "unreachable".into(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<PlayerDefeatedNpc>>);

    #[async_trait]
    impl PlayerEventSink for RecordingSink {
        async fn player_defeated_npc(&self, event: PlayerDefeatedNpc) -> Result<()> {
            self.0.lock().push(event);
            Ok(())
        }
    }

    struct Harness {
        hook: Arc<CountingHook>,
        sink: Arc<RecordingSink>,
        counters: Arc<EncounterCounters>,
        notifier: EventNotifier,
    }

    fn harness(hook: CountingHook, lookup: Result<ConstructInfo>, shutdown: ShutdownSignal) -> Harness {
        let hook = Arc::new(hook);
        let sink = Arc::new(RecordingSink::default());
        let counters = Arc::new(EncounterCounters::new());
        let collaborators = Collaborators {
            reactions: hook.clone(),
            constructs: Arc::new(FixedLookup(lookup)),
            players: sink.clone(),
        };
        let notifier = EventNotifier::new(ConstructId(1), collaborators, counters.clone(), shutdown);
        Harness {
            hook,
            sink,
            counters,
            notifier,
        }
    }

    fn no_lookup() -> Result<ConstructInfo> {
        Err(EncounterError::Config("unused".into()))
    }

    fn args(players: &[u64], last_target: Option<u64>) -> EventArgs {
        EventArgs {
            construct_id: ConstructId(1),
            faction_id: FactionId(-4),
            sector: DVec3::new(13_771_471.0, 7_435_803.0, -128_971.0),
            territory_id: None,
            player_ids: players.iter().copied().map(PlayerId).collect(),
            last_target: last_target.map(ConstructId),
        }
    }

    #[tokio::test]
    async fn second_notify_is_suppressed() {
        let h = harness(CountingHook::default(), no_lookup(), ShutdownSignal::never());
        let a = args(&[10], None);
        assert_eq!(h.notifier.notify(EventKind::ShieldHalf, &a).await.expect("ok"), Delivery::Delivered);
        assert_eq!(h.notifier.notify(EventKind::ShieldHalf, &a).await.expect("ok"), Delivery::Suppressed);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
        assert!(h.notifier.is_published(&EventKind::ShieldHalf));
        assert_eq!(h.counters.snapshot().notifications_suppressed, 1);
    }

    #[tokio::test]
    async fn events_are_independent() {
        let h = harness(CountingHook::default(), no_lookup(), ShutdownSignal::never());
        let a = args(&[10], None);
        h.notifier.notify(EventKind::ShieldHalf, &a).await.expect("ok");
        h.notifier.notify(EventKind::ShieldLow, &a).await.expect("ok");
        h.notifier.notify(EventKind::Custom("OnArrival".into()), &a).await.expect("ok");
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_dispatch_can_be_retried() {
        let hook = CountingHook {
            fail_first: AtomicUsize::new(1),
            ..CountingHook::default()
        };
        let h = harness(hook, no_lookup(), ShutdownSignal::never());
        let a = args(&[10], None);
        assert!(h.notifier.notify(EventKind::CoreStressHigh, &a).await.is_err());
        assert_eq!(h.notifier.state(&EventKind::CoreStressHigh), PublishState::NotPublished);
        assert_eq!(
            h.notifier.notify(EventKind::CoreStressHigh, &a).await.expect("ok"),
            Delivery::Delivered
        );
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.notifier.backoff(&EventKind::CoreStressHigh), None);
    }

    #[tokio::test]
    async fn repeated_failures_back_off_exponentially() {
        let hook = CountingHook {
            fail_first: AtomicUsize::new(3),
            ..CountingHook::default()
        };
        let h = harness(hook, no_lookup(), ShutdownSignal::never());
        let a = args(&[10], None);
        let kind = EventKind::ShieldDown;
        assert!(h.notifier.retry_ready_at(&kind, Utc::now()));

        let mut delays = Vec::new();
        for _ in 0..3 {
            let before = Utc::now();
            assert!(h.notifier.notify(kind.clone(), &a).await.is_err());
            let backoff = h.notifier.backoff(&kind).expect("failure recorded");
            delays.push((backoff.not_before - before).num_seconds());
            assert!(!h.notifier.retry_ready_at(&kind, before));
            assert!(h.notifier.retry_ready_at(&kind, backoff.not_before));
        }
        assert_eq!(delays, vec![1, 2, 4]);
        assert_eq!(h.notifier.backoff(&kind).map(|b| b.failures), Some(3));
    }

    #[test]
    fn backoff_delay_is_capped() {
        let now = Utc::now();
        let mut backoff = None;
        for _ in 0..40 {
            backoff = Some(RetryBackoff::after_failure(backoff, now));
        }
        let backoff = backoff.expect("recorded");
        assert_eq!(backoff.failures, 40);
        assert_eq!((backoff.not_before - now).num_seconds(), RETRY_MAX_SECS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_notifies_deliver_once() {
        let hook = CountingHook {
            delay: Some(Duration::from_millis(20)),
            ..CountingHook::default()
        };
        let h = harness(hook, no_lookup(), ShutdownSignal::never());
        let a = args(&[10], None);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let notifier = h.notifier.clone();
                let a = a.clone();
                tokio::spawn(async move { notifier.notify(EventKind::ShieldDown, &a).await })
            })
            .collect();
        let mut delivered = 0;
        for t in tasks {
            if t.await.expect("join").expect("ok") == Delivery::Delivered {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn destruction_attributes_pilot_when_no_players() {
        let info = ConstructInfo {
            construct_id: ConstructId(77),
            pilot: Some(PlayerId(9)),
            owner: OwnerId::Player(PlayerId(8)),
        };
        let h = harness(CountingHook::default(), Ok(info), ShutdownSignal::never());
        h.notifier
            .notify(EventKind::ConstructDestroyed, &args(&[], Some(77)))
            .await
            .expect("ok");

        let events = h.sink.0.lock().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].player_id, PlayerId(9));
        assert_eq!(events[0].player_count, 1);
        let ctx = h.hook.contexts.lock()[0].clone();
        assert!(ctx.player_ids.contains(&PlayerId(9)));
        assert_eq!(h.counters.snapshot().attribution_fallbacks, 1);
    }

    #[tokio::test]
    async fn destruction_falls_back_to_player_owner() {
        let info = ConstructInfo {
            construct_id: ConstructId(77),
            pilot: None,
            owner: OwnerId::Player(PlayerId(8)),
        };
        let h = harness(CountingHook::default(), Ok(info), ShutdownSignal::never());
        h.notifier
            .notify(EventKind::ConstructDestroyed, &args(&[], Some(77)))
            .await
            .expect("ok");
        assert_eq!(h.sink.0.lock()[0].player_id, PlayerId(8));
    }

    #[tokio::test]
    async fn organization_owner_leaves_destruction_unattributed() {
        let info = ConstructInfo {
            construct_id: ConstructId(77),
            pilot: None,
            owner: OwnerId::Organization(OrganizationId(3)),
        };
        let h = harness(CountingHook::default(), Ok(info), ShutdownSignal::never());
        let delivery = h
            .notifier
            .notify(EventKind::ConstructDestroyed, &args(&[], Some(77)))
            .await
            .expect("ok");
        assert_eq!(delivery, Delivery::Delivered);
        assert!(h.sink.0.lock().is_empty());
        assert!(h.hook.contexts.lock()[0].player_ids.is_empty());
    }

    #[tokio::test]
    async fn failed_lookup_still_runs_reaction() {
        let h = harness(CountingHook::default(), no_lookup(), ShutdownSignal::never());
        let delivery = h
            .notifier
            .notify(EventKind::ConstructDestroyed, &args(&[], Some(77)))
            .await
            .expect("ok");
        assert_eq!(delivery, Delivery::Delivered);
        assert_eq!(h.hook.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.counters.snapshot().attribution_failures, 1);
    }

    #[tokio::test]
    async fn destruction_fans_out_to_every_attacker() {
        let h = harness(CountingHook::default(), no_lookup(), ShutdownSignal::never());
        h.notifier
            .notify(EventKind::ConstructDestroyed, &args(&[1, 2, 3], Some(77)))
            .await
            .expect("ok");
        let mut players: Vec<u64> = h.sink.0.lock().iter().map(|e| e.player_id.0).collect();
        players.sort_unstable();
        assert_eq!(players, vec![1, 2, 3]);
        assert!(h.sink.0.lock().iter().all(|e| e.player_count == 3));
        // Attributed players present, so no lookup.
        assert_eq!(h.counters.snapshot().attribution_fallbacks, 0);
    }

    #[tokio::test]
    async fn shutdown_interrupts_and_releases_claim() {
        let (trigger, signal) = shutdown_channel();
        let hook = CountingHook {
            delay: Some(Duration::from_secs(60)),
            ..CountingHook::default()
        };
        let h = harness(hook, no_lookup(), signal);
        trigger.trigger();
        let delivery = h
            .notifier
            .notify(EventKind::ShieldLow, &args(&[1], None))
            .await
            .expect("ok");
        assert_eq!(delivery, Delivery::Interrupted);
        assert_eq!(h.notifier.state(&EventKind::ShieldLow), PublishState::NotPublished);
    }

    #[test]
    fn shield_readings_map_to_events() {
        let thresholds = NotificationConfig::default();
        assert!(ShieldState::PRISTINE.due_events(&thresholds).is_empty());

        let low = ShieldState {
            shield_ratio: 0.2,
            shield_down: false,
            core_stress_ratio: 0.9,
        };
        assert_eq!(
            low.due_events(&thresholds),
            vec![EventKind::ShieldHalf, EventKind::ShieldLow, EventKind::CoreStressHigh]
        );

        let down = ShieldState {
            shield_ratio: 0.0,
            shield_down: true,
            core_stress_ratio: 0.0,
        };
        assert!(down.due_events(&thresholds).contains(&EventKind::ShieldDown));
    }
}
