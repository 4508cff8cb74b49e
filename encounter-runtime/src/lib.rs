//! # encounter-runtime — Region Runtime for the Encounter Engine
//!
//! This crate drives `encounter-core` behavior contexts from a host game
//! server: it queues perception, routes weapon damage from other threads,
//! runs behavior steps at a fixed frame rate and dispatches lifecycle
//! notifications without stalling the tick.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Host game server              │
//! │   radar sweep        weapon impact          │
//! │       │                   │                 │
//! │       ▼                   ▼                 │
//! │  PerceptionFeed      DamageRouter           │
//! │       │                   │                 │
//! │  ┌────▼───────────────────▼──────────────┐  │
//! │  │ Region (TickLoop @ frames_per_second) │  │
//! │  │   BehaviorStep × BehaviorContext      │  │
//! │  │   ──► tokio::spawn(notify)            │  │
//! │  └───────────────────────────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config` — `encounter.toml` loading (tick rate, logging, engine)
//! - `perception` — per-construct perception frames
//! - `router` — damage routing into per-construct ledgers
//! - `steps` — pluggable behavior steps (select, follow, patrol)
//! - `region` — context ownership and the per-tick pipeline
//! - `tick` — fixed-rate loop with budget monitoring
//! - `hooks` — host callback adapters and logging collaborators
//! - `telemetry` — tracing subscriber bootstrap

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod hooks;
pub mod perception;
pub mod region;
pub mod router;
pub mod steps;
pub mod telemetry;
pub mod tick;

#[cfg(test)]
mod testing;

pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError};
pub use perception::PerceptionFrame;
pub use region::{PerceptionFeed, Region, TickReport};
pub use steps::BehaviorStep;
pub use tick::TickLoop;
