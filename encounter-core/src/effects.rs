//! Radar-target effects: swappable targeting personalities.
//!
//! An effect decides which radar contact the construct should be looking
//! at. The [`EffectHandler`] holds the prefab's default personality and an
//! optional override that expires after a set time, so mission scripting can
//! temporarily change how an NPC picks targets without touching tick logic.

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::targeting;
use crate::types::{ConstructId, RadarContact};

/// Inputs for one selection pass.
#[derive(Debug, Clone, Copy)]
pub struct SelectTargetParams<'a> {
    /// Contacts from the latest radar scan.
    pub contacts: &'a [RadarContact],
    /// Seconds elapsed since the previous tick (already clamped).
    pub delta_time: f64,
    /// The construct currently targeted, if any.
    pub current_target: Option<ConstructId>,
}

/// A targeting personality.
pub trait SelectRadarTargetEffect: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Pick the contact to target, or `None` when there is nothing to target.
    fn select(&mut self, params: &SelectTargetParams<'_>) -> Option<ConstructId>;
}

// ---------------------------------------------------------------------------
// Built-in personalities
// ---------------------------------------------------------------------------

/// Picks a random contact and sticks with the current target for a while.
///
/// A new pick happens once `interval_secs` of tick time has accumulated, or
/// straight away when the current target is missing from radar. A target set
/// elsewhere (retaliation, scripting) is kept like one of its own picks.
#[derive(Debug)]
pub struct RandomRadarTargetEffect {
    interval_secs: f64,
    accumulated: f64,
    rng: StdRng,
}

impl RandomRadarTargetEffect {
    /// Re-select every `interval_secs` seconds, seeded from the OS.
    #[must_use]
    pub fn new(interval_secs: f64) -> Self {
        Self::with_rng(interval_secs, StdRng::from_entropy())
    }

    /// Deterministic variant for tests and replays.
    #[must_use]
    pub fn seeded(interval_secs: f64, seed: u64) -> Self {
        Self::with_rng(interval_secs, StdRng::seed_from_u64(seed))
    }

    fn with_rng(interval_secs: f64, rng: StdRng) -> Self {
        Self {
            interval_secs,
            accumulated: 0.0,
            rng,
        }
    }
}

impl SelectRadarTargetEffect for RandomRadarTargetEffect {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(&mut self, params: &SelectTargetParams<'_>) -> Option<ConstructId> {
        if params.contacts.is_empty() {
            self.accumulated = 0.0;
            return None;
        }

        self.accumulated += params.delta_time;
        let current = params
            .current_target
            .filter(|&id| params.contacts.iter().any(|c| c.construct_id == id));
        if current.is_some() && self.accumulated < self.interval_secs {
            return current;
        }

        self.accumulated = 0.0;
        params.contacts.choose(&mut self.rng).map(|c| c.construct_id)
    }
}

/// Always targets the nearest contact.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClosestRadarTargetEffect;

impl SelectRadarTargetEffect for ClosestRadarTargetEffect {
    fn name(&self) -> &'static str {
        "closest"
    }

    fn select(&mut self, params: &SelectTargetParams<'_>) -> Option<ConstructId> {
        targeting::closest_contact(params.contacts).map(|c| c.construct_id)
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

struct ActiveOverride {
    effect: Box<dyn SelectRadarTargetEffect>,
    expires_at: DateTime<Utc>,
}

/// Owns the default personality and any timed override.
pub struct EffectHandler {
    default_effect: Box<dyn SelectRadarTargetEffect>,
    active: Option<ActiveOverride>,
}

impl std::fmt::Debug for EffectHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandler")
            .field("default", &self.default_effect.name())
            .field("override", &self.active.as_ref().map(|a| (a.effect.name(), a.expires_at)))
            .finish()
    }
}

impl EffectHandler {
    /// Handler running `default_effect` until overridden.
    #[must_use]
    pub fn new(default_effect: Box<dyn SelectRadarTargetEffect>) -> Self {
        Self {
            default_effect,
            active: None,
        }
    }

    /// Run `effect` instead of the default for `duration` from `now`.
    /// Replaces any override already active.
    pub fn activate(
        &mut self,
        effect: Box<dyn SelectRadarTargetEffect>,
        duration: Duration,
        now: DateTime<Utc>,
    ) {
        let expires_at = now.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC);
        debug!(effect = effect.name(), %expires_at, "radar target effect override");
        self.active = Some(ActiveOverride { effect, expires_at });
    }

    /// Drop the override, if any.
    pub fn clear_override(&mut self) {
        self.active = None;
    }

    /// Name of the effect that would run at `now`.
    #[must_use]
    pub fn active_name(&self, now: DateTime<Utc>) -> &'static str {
        match &self.active {
            Some(a) if now <= a.expires_at => a.effect.name(),
            _ => self.default_effect.name(),
        }
    }

    /// Run the effect in force at `now`.
    pub fn select_at(
        &mut self,
        params: &SelectTargetParams<'_>,
        now: DateTime<Utc>,
    ) -> Option<ConstructId> {
        if self.active.as_ref().is_some_and(|a| now > a.expires_at) {
            debug!(
                default = self.default_effect.name(),
                "radar target effect override expired"
            );
            self.active = None;
        }
        match &mut self.active {
            Some(a) => a.effect.select(params),
            None => self.default_effect.select(params),
        }
    }
}

impl Default for EffectHandler {
    fn default() -> Self {
        Self::new(Box::new(RandomRadarTargetEffect::new(5.0)))
    }
}
