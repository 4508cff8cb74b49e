//! # Encounter Core Library
//!
//! Behavior context and targeting engine for autonomous NPC combat
//! constructs. Every live NPC gets a [`BehaviorContext`] that the tick
//! driver feeds with perception and that behaviors query for decisions:
//!
//! - **Kinematics** — braking distance, time-to-velocity, prediction
//! - **Timed properties** — ad-hoc per-construct flags with expiry
//! - **Damage ledger** — time-windowed inbound damage, threat ranking
//! - **Targeting** — retaliate against attackers, else engage the nearest
//! - **Movement planner** — range bands, speed goal, look-ahead horizon
//! - **Radar effects** — swappable target-selection personalities
//! - **Notifications** — at-most-once lifecycle events to scripted reactions
//!
//! ## Threading
//!
//! A context is mutated by one tick at a time. The damage ledger, radar
//! contacts, property store and event guard synchronise internally and may
//! be written from weapon-impact or radar threads. Contexts share nothing
//! mutable with one another.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod behavior;
pub mod config;
pub mod context;
pub mod damage;
pub mod effects;
pub mod error;
pub mod kinematics;
pub mod metrics;
pub mod movement;
pub mod notify;
pub mod properties;
pub mod radar;
pub mod targeting;
pub mod types;
pub mod waypoints;
pub mod weapons;

pub use behavior::BehaviorKind;
pub use config::EncounterConfig;
pub use context::{BehaviorContext, ContextServices, ContextSetup};
pub use damage::{DamageEntry, DamageLedger};
pub use error::{EncounterError, Result};
pub use notify::{Delivery, EventKind, EventNotifier};
pub use types::*;
