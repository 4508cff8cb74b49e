//! Target selection & threat assessment.
//!
//! Retaliate against whoever is hurting us; otherwise engage the nearest
//! contact. Recent attackers (summed damage over the threat window) always
//! win over proximity, and proximity only decides when nobody has fired
//! recently. Both paths sit behind [`assess_threat`] so callers never branch.
//!
//! Ties on summed damage go to the source seen first in the window. Grouping
//! preserves encounter order and the sort is stable, so this holds without a
//! secondary key.
//!
//! Self-targeting is rejected by the context setter, not here.

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use crate::damage::DamageEntry;
use crate::types::{ConstructId, RadarContact};

/// Summed recent damage attributed to one source construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ThreatScore {
    /// Total damage dealt inside the threat window.
    pub score: OrderedFloat<f64>,
    /// Source construct.
    pub construct_id: ConstructId,
}

impl ThreatScore {
    /// Raw summed damage.
    #[must_use]
    pub fn value(self) -> f64 {
        self.score.into_inner()
    }
}

/// Why a construct was judged the top threat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThreatBasis {
    /// It dealt the most damage inside the threat window.
    RecentDamage {
        /// Summed damage.
        damage: f64,
    },
    /// Nobody attacked recently; it is the closest radar contact.
    Proximity {
        /// Distance to the contact (metres).
        distance: f64,
    },
}

/// Result of a threat assessment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreatAssessment {
    /// The construct to engage.
    pub construct_id: ConstructId,
    /// How it was chosen.
    pub basis: ThreatBasis,
}

/// Group `entries` by source and rank by summed damage, highest first.
#[must_use]
pub fn rank_threats(entries: &[DamageEntry]) -> Vec<ThreatScore> {
    let mut order: HashMap<ConstructId, usize> = HashMap::new();
    let mut totals: Vec<(ConstructId, f64)> = Vec::new();

    for entry in entries {
        let idx = *order.entry(entry.source_construct_id).or_insert_with(|| {
            totals.push((entry.source_construct_id, 0.0));
            totals.len() - 1
        });
        totals[idx].1 += entry.damage;
    }

    let mut ranked: Vec<ThreatScore> = totals
        .into_iter()
        .map(|(construct_id, damage)| ThreatScore {
            score: OrderedFloat(damage),
            construct_id,
        })
        .collect();
    // Stable: equal scores keep encounter order.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// The nearest radar contact, or `None` without contacts.
///
/// Equal distances resolve to the contact listed first.
#[must_use]
pub fn closest_contact(contacts: &[RadarContact]) -> Option<&RadarContact> {
    contacts
        .iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

/// Pick the construct to engage from recent damage, falling back to the
/// closest contact.
///
/// `recent` must already be restricted to the threat window.
#[must_use]
pub fn assess_threat(recent: &[DamageEntry], contacts: &[RadarContact]) -> Option<ThreatAssessment> {
    if let Some(top) = rank_threats(recent).first() {
        return Some(ThreatAssessment {
            construct_id: top.construct_id,
            basis: ThreatBasis::RecentDamage {
                damage: top.value(),
            },
        });
    }

    closest_contact(contacts).map(|contact| ThreatAssessment {
        construct_id: contact.construct_id,
        basis: ThreatBasis::Proximity {
            distance: contact.distance,
        },
    })
}
