//! Behavior context: the per-construct aggregate driven once per tick.
//!
//! One [`BehaviorContext`] exists per live NPC construct. The tick driver
//! feeds it perception (position, velocity, shield, radar, damage) and the
//! behaviors read derived state back out: distance and closing rate to the
//! target, the top threat, the velocity plan, due lifecycle events.
//!
//! The context itself is owned by one tick at a time and mutated through
//! `&mut self`. The pieces that other threads write to (damage ledger, radar
//! contacts, property store, event guard) are shared through `Arc` and
//! synchronise internally.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use glam::{DQuat, DVec3};
use tracing::debug;

use crate::behavior::{ActivationTable, BehaviorKind};
use crate::config::{EncounterConfig, NotificationConfig};
use crate::damage::{DamageEntry, DamageLedger};
use crate::effects::{EffectHandler, RandomRadarTargetEffect, SelectTargetParams};
use crate::error::Result;
use crate::kinematics;
use crate::metrics::EncounterCounters;
use crate::movement::{self, MovementTuning, VelocityInput, VelocityPlan};
use crate::notify::{
    Collaborators, Delivery, EventArgs, EventKind, EventNotifier, PublishState, ShutdownSignal,
};
use crate::properties::{PropertyValue, TimedPropertyStore};
use crate::radar::RadarContacts;
use crate::targeting::{self, ThreatAssessment};
use crate::types::{ConstructId, FactionId, PlayerId, RadarContact, ShieldState, TerritoryId};
use crate::waypoints::{Waypoint, WaypointRoute};
use crate::weapons::{self, WeaponDefinition};

/// Shortest tick the kinematics will integrate over (seconds).
pub const MIN_DELTA_TIME: f64 = 1.0 / 60.0;
/// Longest tick the kinematics will integrate over (seconds).
pub const MAX_DELTA_TIME: f64 = 1.0;

/// Property key: steer toward the target automatically.
pub const AUTO_TARGET_MOVE_POSITION_ENABLED: &str = "AutoTargetMovePositionEnabled";
/// Property key: pick attack targets automatically.
pub const AUTO_SELECT_ATTACK_TARGET: &str = "AutoSelectAttackTargetConstruct";

/// How often target acceleration is re-derived from velocity samples.
const ACCELERATION_SAMPLE_SECS: i64 = 1;

/// Static facts about the construct, taken from its prefab and spawn.
#[derive(Debug, Clone)]
pub struct ContextSetup {
    /// The construct this context drives.
    pub construct_id: ConstructId,
    /// Its faction.
    pub faction_id: FactionId,
    /// Position of the sector it spawned in.
    pub sector: DVec3,
    /// Territory it is bound to, if any.
    pub territory_id: Option<TerritoryId>,
    /// Movement tuning.
    pub tuning: MovementTuning,
    /// Weapon loadout.
    pub weapons: Vec<WeaponDefinition>,
    /// Engine configuration.
    pub config: EncounterConfig,
}

/// Shared services a context talks to.
#[derive(Debug, Clone)]
pub struct ContextServices {
    /// External hooks for notifications.
    pub collaborators: Collaborators,
    /// Region-wide counters.
    pub counters: Arc<EncounterCounters>,
    /// Shutdown signal honoured by notification dispatch.
    pub shutdown: ShutdownSignal,
}

impl ContextServices {
    /// Services with fresh counters and no shutdown signal.
    #[must_use]
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            counters: Arc::new(EncounterCounters::new()),
            shutdown: ShutdownSignal::never(),
        }
    }
}

/// What we know about the current target's motion.
#[derive(Debug, Clone, Copy, Default)]
struct TargetTrack {
    position: Option<DVec3>,
    linear_velocity: DVec3,
    acceleration: DVec3,
    distance: f64,
    velocity_dot: f64,
    is_approaching: bool,
    velocity_sample: Option<(DVec3, DateTime<Utc>)>,
}

/// Mutable per-construct simulation state.
#[derive(Debug)]
pub struct BehaviorContext {
    construct_id: ConstructId,
    faction_id: FactionId,
    sector: DVec3,
    territory_id: Option<TerritoryId>,
    tuning: MovementTuning,
    weapons: Vec<WeaponDefinition>,
    thresholds: NotificationConfig,

    delta_time: f64,
    position: Option<DVec3>,
    start_position: Option<DVec3>,
    velocity: DVec3,
    rotation: DQuat,
    shield: ShieldState,
    is_alive: bool,
    is_active_wreck: bool,

    target_construct_id: Option<ConstructId>,
    target_selected_time: Option<DateTime<Utc>>,
    target: TargetTrack,
    target_move_position: Option<DVec3>,

    players: BTreeSet<PlayerId>,
    waypoints: WaypointRoute,
    activation: ActivationTable,
    effects: EffectHandler,

    ledger: Arc<DamageLedger>,
    radar: Arc<RadarContacts>,
    properties: Arc<TimedPropertyStore>,
    notifier: EventNotifier,
    counters: Arc<EncounterCounters>,
}

impl BehaviorContext {
    /// Context for a freshly spawned construct.
    #[must_use]
    pub fn new(setup: ContextSetup, services: ContextServices) -> Self {
        let ContextSetup {
            construct_id,
            faction_id,
            sector,
            territory_id,
            tuning,
            weapons,
            config,
        } = setup;
        let notifier = EventNotifier::new(
            construct_id,
            services.collaborators,
            Arc::clone(&services.counters),
            services.shutdown,
        );

        Self {
            construct_id,
            faction_id,
            sector,
            territory_id,
            tuning,
            weapons,
            thresholds: config.notifications.clone(),
            delta_time: MIN_DELTA_TIME,
            position: None,
            start_position: None,
            velocity: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            shield: ShieldState::PRISTINE,
            is_alive: true,
            is_active_wreck: false,
            target_construct_id: None,
            target_selected_time: None,
            target: TargetTrack::default(),
            target_move_position: None,
            players: BTreeSet::new(),
            waypoints: WaypointRoute::default(),
            activation: ActivationTable::new(),
            effects: EffectHandler::new(Box::new(RandomRadarTargetEffect::new(
                config.targeting.radar_reselect_secs,
            ))),
            ledger: Arc::new(DamageLedger::with_config(&config.damage)),
            radar: Arc::new(RadarContacts::new()),
            properties: Arc::new(TimedPropertyStore::new()),
            notifier,
            counters: services.counters,
        }
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// The construct this context drives.
    #[must_use]
    pub fn construct_id(&self) -> ConstructId {
        self.construct_id
    }

    /// Faction of the construct.
    #[must_use]
    pub fn faction_id(&self) -> FactionId {
        self.faction_id
    }

    /// Sector position.
    #[must_use]
    pub fn sector(&self) -> DVec3 {
        self.sector
    }

    /// Bound territory, if any.
    #[must_use]
    pub fn territory_id(&self) -> Option<TerritoryId> {
        self.territory_id
    }

    /// Movement tuning.
    #[must_use]
    pub fn tuning(&self) -> &MovementTuning {
        &self.tuning
    }

    // ------------------------------------------------------------------
    // Time and spatial state
    // ------------------------------------------------------------------

    /// Seconds since the previous tick, clamped.
    #[must_use]
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Store the tick's elapsed time, clamped to `[1/60, 1]` seconds.
    /// NaN reads as the shortest tick.
    pub fn set_delta_time(&mut self, seconds: f64) {
        self.delta_time = if seconds.is_nan() {
            MIN_DELTA_TIME
        } else {
            seconds.clamp(MIN_DELTA_TIME, MAX_DELTA_TIME)
        };
    }

    /// Current position, unset until first observed.
    #[must_use]
    pub fn position(&self) -> Option<DVec3> {
        self.position
    }

    /// First position ever observed.
    #[must_use]
    pub fn start_position(&self) -> Option<DVec3> {
        self.start_position
    }

    /// Update the position. The first call also latches the start position.
    pub fn set_position(&mut self, position: DVec3) {
        if self.start_position.is_none() {
            self.start_position = Some(position);
        }
        self.position = Some(position);
    }

    /// Own velocity.
    #[must_use]
    pub fn velocity(&self) -> DVec3 {
        self.velocity
    }

    /// Set own velocity.
    pub fn set_velocity(&mut self, velocity: DVec3) {
        self.velocity = velocity;
    }

    /// Own orientation.
    #[must_use]
    pub fn rotation(&self) -> DQuat {
        self.rotation
    }

    /// Set own orientation.
    pub fn set_rotation(&mut self, rotation: DQuat) {
        self.rotation = rotation;
    }

    /// Latest shield/core readings.
    #[must_use]
    pub fn shield(&self) -> ShieldState {
        self.shield
    }

    /// Store shield/core readings.
    pub fn set_shield(&mut self, shield: ShieldState) {
        self.shield = shield;
    }

    /// Whether the construct is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    /// Mark alive or destroyed.
    pub fn set_alive(&mut self, alive: bool) {
        self.is_alive = alive;
    }

    /// Whether a destroyed construct is being kept as a wreck.
    #[must_use]
    pub fn is_active_wreck(&self) -> bool {
        self.is_active_wreck
    }

    /// Mark as an active wreck.
    pub fn set_active_wreck(&mut self, wreck: bool) {
        self.is_active_wreck = wreck;
    }

    // ------------------------------------------------------------------
    // Targeting
    // ------------------------------------------------------------------

    /// The targeted construct.
    #[must_use]
    pub fn target_construct_id(&self) -> Option<ConstructId> {
        self.target_construct_id
    }

    /// When the current target was selected.
    #[must_use]
    pub fn target_selected_time(&self) -> Option<DateTime<Utc>> {
        self.target_selected_time
    }

    /// Target `construct_id`, or clear the target with `None`.
    /// Targeting ourselves is ignored.
    pub fn set_target_construct_id(&mut self, construct_id: Option<ConstructId>) {
        self.set_target_construct_id_at(construct_id, Utc::now());
    }

    /// [`set_target_construct_id`](Self::set_target_construct_id) with an
    /// explicit clock reading.
    pub fn set_target_construct_id_at(&mut self, construct_id: Option<ConstructId>, now: DateTime<Utc>) {
        if construct_id == Some(self.construct_id) {
            return;
        }
        if construct_id != self.target_construct_id {
            debug!(construct = %self.construct_id, target = ?construct_id, "target changed");
            self.target = TargetTrack::default();
        }
        self.target_construct_id = construct_id;
        self.target_selected_time = Some(now);
    }

    /// Last observed target position.
    #[must_use]
    pub fn target_position(&self) -> Option<DVec3> {
        self.target.position
    }

    /// Last observed target velocity.
    #[must_use]
    pub fn target_linear_velocity(&self) -> DVec3 {
        self.target.linear_velocity
    }

    /// Target acceleration from the latest one-second sample.
    #[must_use]
    pub fn target_acceleration(&self) -> DVec3 {
        self.target.acceleration
    }

    /// Distance to the target, 0 until both positions are known.
    #[must_use]
    pub fn target_distance(&self) -> f64 {
        self.target.distance
    }

    /// Cosine between own heading and the target's heading.
    #[must_use]
    pub fn velocity_dot_product(&self) -> f64 {
        self.target.velocity_dot
    }

    /// Whether the distance shrank on the last update.
    #[must_use]
    pub fn is_approaching(&self) -> bool {
        self.target.is_approaching
    }

    /// Feed the target's observed position and velocity.
    pub fn set_target_position(&mut self, position: DVec3, linear_velocity: DVec3) {
        self.set_target_position_at(position, linear_velocity, Utc::now());
    }

    /// [`set_target_position`](Self::set_target_position) with an explicit
    /// clock reading. Acceleration is re-derived at most once per second.
    pub fn set_target_position_at(&mut self, position: DVec3, linear_velocity: DVec3, now: DateTime<Utc>) {
        let track = &mut self.target;
        if let Some(own) = self.position {
            let distance = own.distance(position);
            track.is_approaching = track.position.is_some() && distance < track.distance;
            track.distance = distance;
        }
        track.position = Some(position);
        track.linear_velocity = linear_velocity;
        track.velocity_dot = kinematics::heading_alignment(self.velocity, linear_velocity);

        match track.velocity_sample {
            None => track.velocity_sample = Some((linear_velocity, now)),
            Some((previous, at)) if now - at >= Duration::seconds(ACCELERATION_SAMPLE_SECS) => {
                #[allow(clippy::cast_precision_loss)]
                let dt = (now - at).num_milliseconds() as f64 / 1_000.0;
                track.acceleration = kinematics::acceleration_between(previous, linear_velocity, dt);
                track.velocity_sample = Some((linear_velocity, now));
            }
            Some(_) => {}
        }
    }

    /// Position the construct should steer to when not following a target.
    #[must_use]
    pub fn target_move_position(&self) -> Option<DVec3> {
        self.target_move_position
    }

    /// Set the steering goal.
    pub fn set_target_move_position(&mut self, position: DVec3) {
        self.target_move_position = Some(position);
    }

    /// Where the target will be after the current prediction horizon.
    #[must_use]
    pub fn predicted_target_position(&self) -> Option<DVec3> {
        let position = self.target.position?;
        let seconds = self.plan_velocity().prediction_seconds;
        Some(kinematics::predict_position(
            position,
            self.target.linear_velocity,
            self.target.acceleration,
            seconds,
        ))
    }

    // ------------------------------------------------------------------
    // Movement planning
    // ------------------------------------------------------------------

    /// Optimal range for the loadout at the current target distance.
    /// 0 without both positions.
    #[must_use]
    pub fn optimal_range(&self) -> f64 {
        if self.position.is_none() || self.target.position.is_none() {
            return 0.0;
        }
        weapons::optimal_range(&self.weapons, self.target.distance)
    }

    /// Our distance to a full stop at the current speed.
    #[must_use]
    pub fn braking_distance(&self) -> f64 {
        self.tuning.braking_distance(self.velocity.length())
    }

    /// Planner inputs from the current state.
    #[must_use]
    pub fn velocity_input(&self) -> VelocityInput {
        VelocityInput {
            target_distance: self.target.distance,
            optimal_range: self.optimal_range(),
            target_speed: self.target.linear_velocity.length(),
            velocity_dot: self.target.velocity_dot,
            braking_distance: self.braking_distance(),
        }
    }

    /// Band, speed goal and prediction horizon for this tick.
    #[must_use]
    pub fn plan_velocity(&self) -> VelocityPlan {
        movement::plan_velocity(&self.tuning, &self.velocity_input())
    }

    /// Speed to fly at this tick.
    #[must_use]
    pub fn calculate_velocity_goal(&self) -> f64 {
        self.plan_velocity().velocity_goal
    }

    /// Look-ahead used to predict target movement.
    #[must_use]
    pub fn movement_prediction_seconds(&self) -> f64 {
        self.plan_velocity().prediction_seconds
    }

    // ------------------------------------------------------------------
    // Damage and threat
    // ------------------------------------------------------------------

    /// Shared damage ledger, for writers on other threads.
    #[must_use]
    pub fn ledger(&self) -> &Arc<DamageLedger> {
        &self.ledger
    }

    /// Record inbound damage and attribute its player.
    pub fn register_damage(&mut self, entry: DamageEntry) {
        self.players.insert(entry.player_id);
        self.ledger.record_damage(entry);
        EncounterCounters::bump(&self.counters.damage_recorded);
    }

    /// Players attributed so far, from damage intake on any thread.
    #[must_use]
    pub fn player_ids(&self) -> BTreeSet<PlayerId> {
        let mut players = self.players.clone();
        players.extend(self.ledger.attacking_players_at(Utc::now()));
        players
    }

    /// Attribute a player directly.
    pub fn add_player(&mut self, player_id: PlayerId) {
        self.players.insert(player_id);
    }

    /// Who to engage and why, as of `now`.
    #[must_use]
    pub fn assess_threat_at(&self, now: DateTime<Utc>) -> Option<ThreatAssessment> {
        let recent = self.ledger.recent_damage_at(self.ledger.threat_window(), now);
        targeting::assess_threat(&recent, &self.radar.snapshot())
    }

    /// The construct to engage: top recent attacker, else the closest contact.
    #[must_use]
    pub fn highest_threat_construct(&self) -> Option<ConstructId> {
        self.highest_threat_construct_at(Utc::now())
    }

    /// [`highest_threat_construct`](Self::highest_threat_construct) with an
    /// explicit clock reading.
    #[must_use]
    pub fn highest_threat_construct_at(&self, now: DateTime<Utc>) -> Option<ConstructId> {
        self.assess_threat_at(now).map(|t| t.construct_id)
    }

    // ------------------------------------------------------------------
    // Radar
    // ------------------------------------------------------------------

    /// Shared radar contact set, for writers on other threads.
    #[must_use]
    pub fn radar(&self) -> &Arc<RadarContacts> {
        &self.radar
    }

    /// Replace the contact set with a fresh scan.
    pub fn update_radar_contacts(&self, contacts: Vec<RadarContact>) {
        self.radar.replace(contacts);
    }

    /// Nearest radar contact.
    #[must_use]
    pub fn closest_target(&self) -> Option<RadarContact> {
        self.radar.closest()
    }

    /// Effect handler, for installing timed overrides.
    pub fn effects_mut(&mut self) -> &mut EffectHandler {
        &mut self.effects
    }

    /// Run the radar-target effect and adopt its pick as the target.
    /// Returns the target afterwards.
    pub fn select_radar_target(&mut self) -> Option<ConstructId> {
        self.select_radar_target_at(Utc::now())
    }

    /// [`select_radar_target`](Self::select_radar_target) with an explicit
    /// clock reading.
    pub fn select_radar_target_at(&mut self, now: DateTime<Utc>) -> Option<ConstructId> {
        let contacts = self.radar.snapshot();
        let params = SelectTargetParams {
            contacts: &contacts,
            delta_time: self.delta_time,
            current_target: self.target_construct_id,
        };
        let pick = self.effects.select_at(&params, now)?;
        self.set_target_construct_id_at(Some(pick), now);
        self.target_construct_id
    }

    // ------------------------------------------------------------------
    // Properties and behavior flags
    // ------------------------------------------------------------------

    /// Shared timed property store.
    #[must_use]
    pub fn properties(&self) -> &Arc<TimedPropertyStore> {
        &self.properties
    }

    /// Store a property with optional time-to-live.
    pub fn set_property(&self, key: &str, value: PropertyValue, ttl: Option<Duration>) {
        self.properties.set(key, value, ttl);
    }

    /// Drop expired properties. Returns how many were removed.
    pub fn sweep_expired_properties(&self) -> usize {
        self.properties.sweep_expired()
    }

    /// Whether the construct steers toward its target automatically.
    #[must_use]
    pub fn auto_target_move_position_enabled(&self) -> bool {
        self.properties
            .flag_at(AUTO_TARGET_MOVE_POSITION_ENABLED, Utc::now())
            .unwrap_or(true)
    }

    /// Enable or disable automatic steering.
    pub fn set_auto_target_move_position_enabled(&self, enabled: bool) {
        self.properties
            .set(AUTO_TARGET_MOVE_POSITION_ENABLED, PropertyValue::Flag(enabled), None);
    }

    /// Whether the construct picks attack targets automatically.
    #[must_use]
    pub fn auto_select_attack_target_enabled(&self) -> bool {
        self.properties
            .flag_at(AUTO_SELECT_ATTACK_TARGET, Utc::now())
            .unwrap_or(true)
    }

    /// Enable or disable automatic target selection.
    pub fn set_auto_select_attack_target_enabled(&self, enabled: bool) {
        self.properties
            .set(AUTO_SELECT_ATTACK_TARGET, PropertyValue::Flag(enabled), None);
    }

    /// Stop running `kind`.
    pub fn deactivate(&mut self, kind: BehaviorKind) {
        debug!(construct = %self.construct_id, behavior = %kind, "behavior deactivated");
        self.activation.deactivate(kind);
    }

    /// Resume running `kind`.
    pub fn activate(&mut self, kind: BehaviorKind) {
        self.activation.activate(kind);
    }

    /// Whether `kind` should run this tick.
    #[must_use]
    pub fn is_behavior_active(&self, kind: BehaviorKind) -> bool {
        self.activation.is_active(kind)
    }

    // ------------------------------------------------------------------
    // Waypoints
    // ------------------------------------------------------------------

    /// Replace the route.
    pub fn set_waypoints(&mut self, route: WaypointRoute) {
        self.waypoints = route;
    }

    /// The route.
    #[must_use]
    pub fn waypoints(&self) -> &WaypointRoute {
        &self.waypoints
    }

    /// Next waypoint not yet visited.
    #[must_use]
    pub fn next_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.next()
    }

    /// Mark the next waypoint visited.
    pub fn mark_waypoint_visited(&mut self) -> Option<Waypoint> {
        self.waypoints.mark_next_visited()
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Snapshot handed to the notifier.
    #[must_use]
    pub fn event_args(&self) -> EventArgs {
        EventArgs {
            construct_id: self.construct_id,
            faction_id: self.faction_id,
            sector: self.sector,
            territory_id: self.territory_id,
            player_ids: self.player_ids(),
            last_target: self.target_construct_id,
        }
    }

    /// A handle on the notifier, for dispatching off the tick.
    #[must_use]
    pub fn notifier(&self) -> EventNotifier {
        self.notifier.clone()
    }

    /// Lifecycle events the current state calls for that have not been
    /// published or claimed yet, and are not waiting out a retry delay.
    #[must_use]
    pub fn due_events(&self) -> Vec<EventKind> {
        self.due_events_at(Utc::now())
    }

    /// [`due_events`](Self::due_events) with an explicit clock reading.
    #[must_use]
    pub fn due_events_at(&self, now: DateTime<Utc>) -> Vec<EventKind> {
        let mut due = self.shield.due_events(&self.thresholds);
        if !self.is_alive {
            due.insert(0, EventKind::ConstructDestroyed);
        }
        due.retain(|kind| {
            self.notifier.state(kind) == PublishState::NotPublished
                && self.notifier.retry_ready_at(kind, now)
        });
        due
    }

    /// Deliver `kind` at most once.
    ///
    /// # Errors
    /// Returns the reaction hook's error; the event may be retried.
    pub async fn notify(&self, kind: EventKind) -> Result<Delivery> {
        self.notifier.notify(kind, &self.event_args()).await
    }

    /// Deliver the destruction event.
    ///
    /// # Errors
    /// See [`notify`](Self::notify).
    pub async fn notify_construct_destroyed(&self) -> Result<Delivery> {
        self.notify(EventKind::ConstructDestroyed).await
    }

    /// Deliver the shield-half event.
    ///
    /// # Errors
    /// See [`notify`](Self::notify).
    pub async fn notify_shield_half(&self) -> Result<Delivery> {
        self.notify(EventKind::ShieldHalf).await
    }

    /// Deliver the shield-low event.
    ///
    /// # Errors
    /// See [`notify`](Self::notify).
    pub async fn notify_shield_low(&self) -> Result<Delivery> {
        self.notify(EventKind::ShieldLow).await
    }

    /// Deliver the shield-down event.
    ///
    /// # Errors
    /// See [`notify`](Self::notify).
    pub async fn notify_shield_down(&self) -> Result<Delivery> {
        self.notify(EventKind::ShieldDown).await
    }

    /// Deliver the core-stress-high event.
    ///
    /// # Errors
    /// See [`notify`](Self::notify).
    pub async fn notify_core_stress_high(&self) -> Result<Delivery> {
        self.notify(EventKind::CoreStressHigh).await
    }
}
