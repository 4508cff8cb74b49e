//! Radar contact set, replaced wholesale on every scan.
//!
//! Scans can land from a perception thread while the tick reads the set, so
//! the list sits behind an `RwLock<Arc<..>>`: writers swap in a new `Arc`,
//! readers clone the current one and work outside the lock.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::targeting;
use crate::types::{ConstructId, RadarContact};

/// The latest radar scan for one construct.
#[derive(Debug, Default)]
pub struct RadarContacts {
    current: RwLock<Arc<Vec<RadarContact>>>,
}

impl RadarContacts {
    /// Empty contact set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every contact with `contacts`. Contacts missing from the new
    /// scan are gone.
    pub fn replace(&self, contacts: Vec<RadarContact>) {
        *self.current.write() = Arc::new(contacts);
    }

    /// Drop every contact.
    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    /// The current scan.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<RadarContact>> {
        Arc::clone(&self.current.read())
    }

    /// Nearest contact in the current scan.
    #[must_use]
    pub fn closest(&self) -> Option<RadarContact> {
        targeting::closest_contact(&self.snapshot()).copied()
    }

    /// Contact for `construct_id`, if it is on radar.
    #[must_use]
    pub fn find(&self, construct_id: ConstructId) -> Option<RadarContact> {
        self.snapshot()
            .iter()
            .find(|c| c.construct_id == construct_id)
            .copied()
    }

    /// Number of contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    /// Whether the scan is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn contact(id: u64, distance: f64) -> RadarContact {
        RadarContact::new(ConstructId(id), DVec3::ZERO, distance)
    }

    #[test]
    fn replace_discards_stale_contacts() {
        let radar = RadarContacts::new();
        radar.replace(vec![contact(1, 10.0), contact(2, 20.0)]);
        radar.replace(vec![contact(3, 30.0)]);
        assert_eq!(radar.len(), 1);
        assert!(radar.find(ConstructId(1)).is_none());
        assert_eq!(radar.closest().map(|c| c.construct_id), Some(ConstructId(3)));
    }

    #[test]
    fn snapshot_survives_replacement() {
        let radar = RadarContacts::new();
        radar.replace(vec![contact(1, 10.0)]);
        let before = radar.snapshot();
        radar.clear();
        assert_eq!(before.len(), 1);
        assert!(radar.is_empty());
    }
}
