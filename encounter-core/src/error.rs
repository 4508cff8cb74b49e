//! Error types for the encounter core library.
//!
//! Per-tick computation never fails: clamps and `Option` absorb bad or
//! missing perception. Only configuration, the external hooks and the
//! driving loop surface errors.

use thiserror::Error;

use crate::types::ConstructId;

/// Top-level error type for all encounter operations.
#[derive(Error, Debug)]
pub enum EncounterError {
    /// Configuration could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The driving loop was given a frame rate it cannot run at.
    #[error("Invalid tick rate: {0} frames per second (must be > 0)")]
    InvalidTickRate(f64),

    /// Construct/player lookup failed in an external service.
    #[error("Construct lookup failed for {construct}: {reason}")]
    Lookup {
        /// Construct that was being resolved.
        construct: ConstructId,
        /// Why the lookup failed.
        reason: String,
    },

    /// The scripted-reaction executor rejected or failed an event.
    #[error("Reaction hook failed for event '{event}': {reason}")]
    Reaction {
        /// Event name that was being dispatched.
        event: String,
        /// Failure reported by the hook.
        reason: String,
    },

    /// A player-directed event could not be published.
    #[error("Player event publish failed: {0}")]
    Publish(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EncounterError>;
