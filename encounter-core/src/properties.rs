//! Timed property store: ad-hoc behavior state with per-key expiry.
//!
//! Used for loosely structured flags (custom movement markers, temporary
//! overrides) that vary per prefab and do not deserve a dedicated field on
//! the behavior context. Values are a closed tagged union rather than
//! arbitrary objects, and each domain reads them through a typed accessor.
//!
//! A key counts as absent once `now > expires_at`. Reads never remove
//! anything; [`TimedPropertyStore::sweep_expired`] is called periodically by
//! the owner to bound memory.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A single typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// On/off flag.
    Flag(bool),
    /// Whole number.
    Integer(i64),
    /// Floating point number.
    Number(f64),
    /// Free text.
    Text(String),
    /// A single world-space point.
    Vector(DVec3),
    /// An ordered list of world-space points.
    Vectors(Vec<DVec3>),
}

#[derive(Debug, Clone)]
struct TimedEntry {
    expires_at: Option<DateTime<Utc>>,
    value: PropertyValue,
}

impl TimedEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// Concurrent key → value store with optional per-key time-to-live.
#[derive(Debug, Default)]
pub struct TimedPropertyStore {
    entries: DashMap<String, TimedEntry>,
}

impl TimedPropertyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite `key`. `None` ttl never expires.
    pub fn set(&self, key: impl Into<String>, value: PropertyValue, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, Utc::now());
    }

    /// [`set`](Self::set) with an explicit clock reading.
    pub fn set_at(
        &self,
        key: impl Into<String>,
        value: PropertyValue,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) {
        let expires_at = ttl.and_then(|ttl| now.checked_add_signed(ttl));
        self.entries.insert(key.into(), TimedEntry { expires_at, value });
    }

    /// Current value of `key`, or `None` if absent or expired.
    #[must_use]
    pub fn try_get(&self, key: &str) -> Option<PropertyValue> {
        self.try_get_at(key, Utc::now())
    }

    /// [`try_get`](Self::try_get) with an explicit clock reading.
    #[must_use]
    pub fn try_get_at(&self, key: &str, now: DateTime<Utc>) -> Option<PropertyValue> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Remove `key` regardless of expiry.
    pub fn remove(&self, key: &str) -> Option<PropertyValue> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    /// [`sweep_expired`](Self::sweep_expired) with an explicit clock reading.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included until swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    /// Read a flag. Wrong-typed values read as absent.
    #[must_use]
    pub fn flag_at(&self, key: &str, now: DateTime<Utc>) -> Option<bool> {
        match self.try_get_at(key, now)? {
            PropertyValue::Flag(v) => Some(v),
            _ => None,
        }
    }

    /// Read a number; integers widen to `f64`.
    #[must_use]
    pub fn number_at(&self, key: &str, now: DateTime<Utc>) -> Option<f64> {
        match self.try_get_at(key, now)? {
            PropertyValue::Number(v) => Some(v),
            #[allow(clippy::cast_precision_loss)]
            PropertyValue::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Read a text value.
    #[must_use]
    pub fn text_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        match self.try_get_at(key, now)? {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Read a single point.
    #[must_use]
    pub fn vector_at(&self, key: &str, now: DateTime<Utc>) -> Option<DVec3> {
        match self.try_get_at(key, now)? {
            PropertyValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Read a list of points.
    #[must_use]
    pub fn vectors_at(&self, key: &str, now: DateTime<Utc>) -> Option<Vec<DVec3>> {
        match self.try_get_at(key, now)? {
            PropertyValue::Vectors(v) => Some(v),
            _ => None,
        }
    }
}
