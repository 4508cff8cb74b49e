//! Error types for the encounter runtime.

use encounter_core::error::EncounterError;
use encounter_core::types::ConstructId;
use thiserror::Error;

/// Errors raised while wiring or running a region.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Engine-level failure (configuration, hooks, tick rate).
    #[error(transparent)]
    Engine(#[from] EncounterError),

    /// Runtime configuration could not be parsed.
    #[error("Runtime configuration error: {0}")]
    Config(String),

    /// The tracing subscriber could not be installed.
    #[error("Telemetry init failed: {0}")]
    Telemetry(String),

    /// A construct with this id is already simulated in the region.
    #[error("Construct {0} is already spawned")]
    AlreadySpawned(ConstructId),

    /// The region owning a perception feed is gone.
    #[error("Perception feed closed")]
    FeedClosed,

    /// A dispatched notification task panicked or was cancelled.
    #[error("Notification task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, RuntimeError>;
