//! A simulated region: the behavior contexts one tick loop drives.
//!
//! Each tick the region
//! 1. applies queued perception frames, timing target motion by the ticks
//!    since each construct's previous frame,
//! 2. clamps and stores the frame time,
//! 3. runs every active [`BehaviorStep`],
//! 4. spawns due lifecycle notifications as tokio tasks,
//! 5. retires destroyed constructs once their destruction is published.
//!
//! Notification tasks never block the tick. [`Region::drain`] awaits the
//! ones still in flight.

use std::collections::HashMap;
use std::sync::Arc;

use encounter_core::context::{BehaviorContext, ContextServices, ContextSetup};
use encounter_core::metrics::{EncounterCounters, spans};
use encounter_core::movement::MovementTuning;
use encounter_core::notify::{Collaborators, Delivery, EventKind, ShutdownSignal};
use encounter_core::types::{ConstructId, FactionId};
use encounter_core::weapons::WeaponDefinition;
use glam::DVec3;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, info, trace, warn};

use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::perception::{PerceptionFrame, apply_perception};
use crate::router::DamageRouter;
use crate::steps::BehaviorStep;

// ---------------------------------------------------------------------------
// Perception feed
// ---------------------------------------------------------------------------

/// Sender half of a region's perception queue. Cheap to clone and usable
/// from any thread.
#[derive(Debug, Clone)]
pub struct PerceptionFeed(mpsc::UnboundedSender<PerceptionFrame>);

impl PerceptionFeed {
    /// Queue `frame` for the next tick.
    ///
    /// # Errors
    /// `RuntimeError::FeedClosed` once the region has been dropped.
    pub fn submit(&self, frame: PerceptionFrame) -> Result<()> {
        self.0.send(frame).map_err(|_| RuntimeError::FeedClosed)
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Perception frames applied.
    pub frames_applied: usize,
    /// Frames addressed to constructs not in the region.
    pub frames_dropped: usize,
    /// Notification tasks spawned.
    pub notifications_spawned: usize,
    /// Constructs retired after their destruction was published.
    pub retired: usize,
}

/// Owns every behavior context of one simulated region.
pub struct Region {
    contexts: HashMap<ConstructId, BehaviorContext>,
    since_frame: HashMap<ConstructId, f64>,
    steps: Vec<Box<dyn BehaviorStep>>,
    router: Arc<DamageRouter>,
    feed: PerceptionFeed,
    inbox: mpsc::UnboundedReceiver<PerceptionFrame>,
    collaborators: Collaborators,
    counters: Arc<EncounterCounters>,
    shutdown: ShutdownSignal,
    config: RuntimeConfig,
    dispatches: Vec<JoinHandle<()>>,
    ticks: u64,
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("contexts", &self.contexts.len())
            .field("steps", &self.steps.len())
            .field("in_flight", &self.dispatches.len())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl Region {
    /// Empty region running `steps` against every context.
    #[must_use]
    pub fn new(
        config: RuntimeConfig,
        collaborators: Collaborators,
        steps: Vec<Box<dyn BehaviorStep>>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let counters = Arc::new(EncounterCounters::new());
        let (tx, inbox) = mpsc::unbounded_channel();
        Self {
            contexts: HashMap::new(),
            since_frame: HashMap::new(),
            steps,
            router: Arc::new(DamageRouter::new(Arc::clone(&counters))),
            feed: PerceptionFeed(tx),
            inbox,
            collaborators,
            counters,
            shutdown,
            config,
            dispatches: Vec::new(),
            ticks: 0,
        }
    }

    /// A setup carrying this region's engine config and movement modifiers.
    #[must_use]
    pub fn context_setup(
        &self,
        construct_id: ConstructId,
        faction_id: FactionId,
        sector: DVec3,
        weapons: Vec<WeaponDefinition>,
    ) -> ContextSetup {
        ContextSetup {
            construct_id,
            faction_id,
            sector,
            territory_id: None,
            tuning: MovementTuning {
                modifiers: self.config.engine.movement.clone(),
                ..MovementTuning::default()
            },
            weapons,
            config: self.config.engine.clone(),
        }
    }

    /// Start simulating a construct.
    ///
    /// # Errors
    /// `RuntimeError::AlreadySpawned` if the id is already in the region.
    pub fn spawn(&mut self, setup: ContextSetup) -> Result<&mut BehaviorContext> {
        let construct_id = setup.construct_id;
        if self.contexts.contains_key(&construct_id) {
            return Err(RuntimeError::AlreadySpawned(construct_id));
        }
        let services = ContextServices {
            collaborators: self.collaborators.clone(),
            counters: Arc::clone(&self.counters),
            shutdown: self.shutdown.clone(),
        };
        let ctx = BehaviorContext::new(setup, services);
        self.router.register(construct_id, Arc::clone(ctx.ledger()));
        self.since_frame.insert(construct_id, 0.0);
        info!(construct = %construct_id, faction = %ctx.faction_id(), "npc spawned");
        Ok(self.contexts.entry(construct_id).or_insert(ctx))
    }

    /// Stop simulating a construct. Returns its context.
    pub fn despawn(&mut self, construct_id: ConstructId) -> Option<BehaviorContext> {
        self.router.unregister(construct_id);
        self.since_frame.remove(&construct_id);
        let ctx = self.contexts.remove(&construct_id);
        if ctx.is_some() {
            info!(construct = %construct_id, "npc despawned");
        }
        ctx
    }

    /// Context of `construct_id`.
    #[must_use]
    pub fn context(&self, construct_id: ConstructId) -> Option<&BehaviorContext> {
        self.contexts.get(&construct_id)
    }

    /// Mutable context of `construct_id`.
    pub fn context_mut(&mut self, construct_id: ConstructId) -> Option<&mut BehaviorContext> {
        self.contexts.get_mut(&construct_id)
    }

    /// Constructs in the region.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the region is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Where weapon-impact handling should send damage.
    #[must_use]
    pub fn router(&self) -> Arc<DamageRouter> {
        Arc::clone(&self.router)
    }

    /// Where radar and state updates should be queued.
    #[must_use]
    pub fn feed(&self) -> PerceptionFeed {
        self.feed.clone()
    }

    /// Region-wide counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<EncounterCounters> {
        &self.counters
    }

    /// Notification tasks not yet reaped.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.dispatches.len()
    }

    /// Ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance every context by `delta_time` seconds.
    ///
    /// Must run inside a tokio runtime; notifications are spawned onto it.
    pub fn tick(&mut self, delta_time: f64) -> TickReport {
        let mut report = TickReport::default();
        self.ticks += 1;

        if delta_time.is_finite() && delta_time > 0.0 {
            for elapsed in self.since_frame.values_mut() {
                *elapsed += delta_time;
            }
        }

        while let Ok(frame) = self.inbox.try_recv() {
            if let Some(ctx) = self.contexts.get_mut(&frame.construct_id) {
                let elapsed = self
                    .since_frame
                    .get_mut(&frame.construct_id)
                    .map_or(0.0, std::mem::take);
                debug_span!(spans::PERCEPTION, construct = %frame.construct_id)
                    .in_scope(|| apply_perception(ctx, frame, elapsed));
                report.frames_applied += 1;
            } else {
                trace!(construct = %frame.construct_id, "perception for unknown construct");
                report.frames_dropped += 1;
            }
        }

        let sweep = self.config.tick.sweep_every_ticks;
        let sweep_now = sweep > 0 && self.ticks % sweep == 0;

        for ctx in self.contexts.values_mut() {
            ctx.set_delta_time(delta_time);
            if ctx.is_alive() {
                for step in &mut self.steps {
                    if ctx.is_behavior_active(step.kind()) {
                        step.step(ctx);
                    }
                }
            }
            if sweep_now {
                let swept = ctx.sweep_expired_properties();
                if swept > 0 {
                    trace!(construct = %ctx.construct_id(), swept, "expired properties swept");
                }
            }
            for kind in ctx.due_events() {
                self.dispatches.push(spawn_notification(ctx, kind));
                report.notifications_spawned += 1;
            }
        }

        self.dispatches.retain(|handle| !handle.is_finished());
        report.retired = self.retire_destroyed();
        EncounterCounters::bump(&self.counters.ticks);
        report
    }

    /// Await every notification still in flight.
    ///
    /// # Errors
    /// `RuntimeError::Join` if a notification task panicked.
    pub async fn drain(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.dispatches);
        debug!(count = pending.len(), "draining notifications");
        for handle in pending {
            handle.await?;
        }
        Ok(())
    }

    fn retire_destroyed(&mut self) -> usize {
        let retired: Vec<ConstructId> = self
            .contexts
            .values()
            .filter(|ctx| {
                !ctx.is_alive()
                    && !ctx.is_active_wreck()
                    && ctx.notifier().is_published(&EventKind::ConstructDestroyed)
            })
            .map(BehaviorContext::construct_id)
            .collect();
        for id in &retired {
            self.router.unregister(*id);
            self.since_frame.remove(id);
            self.contexts.remove(id);
            info!(construct = %id, "npc retired after destruction");
        }
        retired.len()
    }
}

fn spawn_notification(ctx: &BehaviorContext, kind: EventKind) -> JoinHandle<()> {
    let notifier = ctx.notifier();
    let args = ctx.event_args();
    tokio::spawn(async move {
        match notifier.notify(kind.clone(), &args).await {
            Ok(Delivery::Delivered) => trace!(construct = %args.construct_id, event = %kind, "delivered"),
            Ok(Delivery::Suppressed | Delivery::Interrupted) => {}
            Err(e) => warn!(
                construct = %args.construct_id,
                event = %kind,
                error = %e,
                "notification will be retried"
            ),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::logging_collaborators;
    use crate::steps::default_steps;
    use crate::testing::setup;
    use async_trait::async_trait;
    use encounter_core::damage::DamageEntry;
    use encounter_core::error::{EncounterError, Result as EngineResult};
    use encounter_core::notify::{ReactionHook, ScriptContext, shutdown_channel};
    use encounter_core::types::{PlayerId, RadarContact, ShieldState};
    use glam::DQuat;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn region() -> Region {
        Region::new(
            RuntimeConfig::default(),
            logging_collaborators(),
            default_steps(),
            ShutdownSignal::never(),
        )
    }

    fn frame(id: ConstructId, contacts: Vec<RadarContact>) -> PerceptionFrame {
        PerceptionFrame {
            construct_id: id,
            position: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            velocity: DVec3::ZERO,
            shield: ShieldState::PRISTINE,
            radar_contacts: contacts,
            damage_events: Vec::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_spawn_is_rejected() {
        let mut region = region();
        region.spawn(setup(ConstructId(1))).expect("first");
        let err = region.spawn(setup(ConstructId(1))).expect_err("duplicate");
        assert!(matches!(err, RuntimeError::AlreadySpawned(ConstructId(1))));
        assert_eq!(region.len(), 1);
        assert_eq!(region.router().len(), 1);
    }

    #[tokio::test]
    async fn queued_perception_drives_targeting() {
        let mut region = region();
        region.spawn(setup(ConstructId(1))).expect("spawn");
        let feed = region.feed();
        feed.submit(frame(
            ConstructId(1),
            vec![RadarContact::new(ConstructId(2), DVec3::X * 4_000.0, 4_000.0)],
        ))
        .expect("open");
        feed.submit(frame(ConstructId(99), Vec::new())).expect("open");

        let report = region.tick(0.05);
        assert_eq!(report.frames_applied, 1);
        assert_eq!(report.frames_dropped, 1);
        let ctx = region.context(ConstructId(1)).expect("spawned");
        assert_eq!(ctx.target_construct_id(), Some(ConstructId(2)));
        assert!((ctx.delta_time() - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn routed_damage_reaches_context() {
        let mut region = region();
        region.spawn(setup(ConstructId(1))).expect("spawn");
        assert!(region.router().route(ConstructId(1), DamageEntry::now(ConstructId(8), PlayerId(4), 75.0)));
        region.tick(0.05);
        let ctx = region.context(ConstructId(1)).expect("spawned");
        assert_eq!(ctx.target_construct_id(), Some(ConstructId(8)));
        assert!(ctx.player_ids().contains(&PlayerId(4)));
    }

    #[tokio::test]
    async fn destroyed_construct_is_retired_after_publish() {
        let mut region = region();
        region.spawn(setup(ConstructId(1))).expect("spawn").set_alive(false);

        let first = region.tick(0.05);
        assert_eq!(first.notifications_spawned, 1);
        region.drain().await.expect("no panics");

        let second = region.tick(0.05);
        assert_eq!(second.retired, 1);
        assert!(region.is_empty());
        assert!(region.router().is_empty());
    }

    #[tokio::test]
    async fn wrecks_stay_in_region() {
        let mut region = region();
        let ctx = region.spawn(setup(ConstructId(1))).expect("spawn");
        ctx.set_alive(false);
        ctx.set_active_wreck(true);
        region.tick(0.05);
        region.drain().await.expect("no panics");
        region.tick(0.05);
        assert_eq!(region.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_interrupts_pending_notifications() {
        let (trigger, signal) = shutdown_channel();
        let mut region = Region::new(RuntimeConfig::default(), logging_collaborators(), Vec::new(), signal);
        region.spawn(setup(ConstructId(1))).expect("spawn").set_alive(false);
        trigger.trigger();
        region.tick(0.05);
        region.drain().await.expect("no panics");
        let ctx = region.context(ConstructId(1)).expect("not retired");
        assert!(!ctx.notifier().is_published(&EventKind::ConstructDestroyed));
    }

    #[tokio::test]
    async fn closing_target_motion_survives_default_steps() {
        let mut region = region();
        region.spawn(setup(ConstructId(1))).expect("spawn");
        let feed = region.feed();

        for tick in 0..5_u32 {
            let x = 50_000.0 - 100.0 * f64::from(tick);
            let mut next = frame(
                ConstructId(1),
                vec![RadarContact::new(ConstructId(2), DVec3::X * x, x)],
            );
            next.velocity = DVec3::X * 200.0;
            feed.submit(next).expect("open");
            region.tick(0.05);

            if tick == 0 {
                continue;
            }
            let ctx = region.context(ConstructId(1)).expect("spawned");
            assert_eq!(ctx.target_construct_id(), Some(ConstructId(2)));
            assert!(
                (ctx.target_linear_velocity() - DVec3::X * -2_000.0).length() < 1e-6,
                "tick {tick}: {:?}",
                ctx.target_linear_velocity()
            );
            assert!(ctx.is_approaching());
            assert!(ctx.velocity_dot_product() < 0.0);
            assert!((ctx.velocity_input().target_speed - 2_000.0).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn frames_skipping_ticks_use_the_full_interval() {
        let mut region = region();
        region.spawn(setup(ConstructId(1))).expect("spawn");
        let feed = region.feed();

        feed.submit(frame(
            ConstructId(1),
            vec![RadarContact::new(ConstructId(2), DVec3::X * 10_000.0, 10_000.0)],
        ))
        .expect("open");
        region.tick(0.05);
        region.tick(0.05);
        region.tick(0.05);
        feed.submit(frame(
            ConstructId(1),
            vec![RadarContact::new(ConstructId(2), DVec3::X * 9_700.0, 9_700.0)],
        ))
        .expect("open");
        region.tick(0.05);

        let ctx = region.context(ConstructId(1)).expect("spawned");
        assert!((ctx.target_linear_velocity().x + 2_000.0).abs() < 1e-6);
    }

    #[derive(Default)]
    struct FailingReactions {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReactionHook for FailingReactions {
        async fn execute(&self, event: &EventKind, _context: &ScriptContext) -> EngineResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EncounterError::Reaction {
                event: event.name().to_owned(),
                reason: "script crashed".into(),
            })
        }
    }

    #[tokio::test]
    async fn failing_reaction_is_not_respawned_every_tick() {
        let failing = Arc::new(FailingReactions::default());
        let collaborators = Collaborators {
            reactions: failing.clone(),
            ..logging_collaborators()
        };
        let mut region = Region::new(
            RuntimeConfig::default(),
            collaborators,
            Vec::new(),
            ShutdownSignal::never(),
        );
        region.spawn(setup(ConstructId(1))).expect("spawn").set_alive(false);

        let mut spawned = 0;
        for _ in 0..20 {
            spawned += region.tick(0.05).notifications_spawned;
            region.drain().await.expect("no panics");
        }
        assert_eq!(spawned, 1);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        let ctx = region.context(ConstructId(1)).expect("not retired");
        let backoff = ctx
            .notifier()
            .backoff(&EventKind::ConstructDestroyed)
            .expect("failure recorded");
        assert_eq!(backoff.failures, 1);
        let later = backoff.not_before + chrono::Duration::milliseconds(1);
        assert_eq!(ctx.due_events_at(later), vec![EventKind::ConstructDestroyed]);
    }

    #[test]
    fn feed_reports_closed_region() {
        let feed = region().feed();
        let err = feed.submit(frame(ConstructId(1), Vec::new())).expect_err("closed");
        assert!(matches!(err, RuntimeError::FeedClosed));
    }
}
