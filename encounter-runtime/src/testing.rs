//! Shared fixtures for unit tests.

use encounter_core::config::EncounterConfig;
use encounter_core::context::{BehaviorContext, ContextServices, ContextSetup};
use encounter_core::movement::MovementTuning;
use encounter_core::types::{ConstructId, FactionId};
use glam::DVec3;

use crate::hooks::logging_collaborators;

pub(crate) fn setup(construct_id: ConstructId) -> ContextSetup {
    ContextSetup {
        construct_id,
        faction_id: FactionId(3),
        sector: DVec3::ZERO,
        territory_id: None,
        tuning: MovementTuning::default(),
        weapons: Vec::new(),
        config: EncounterConfig::default(),
    }
}

pub(crate) fn context(construct_id: ConstructId) -> BehaviorContext {
    BehaviorContext::new(setup(construct_id), ContextServices::new(logging_collaborators()))
}
