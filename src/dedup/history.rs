// src/dedup/history.rs

//! Time-windowed, size-bounded sighting history.
//!
//! Each key moves through `unseen -> fresh -> debounced -> expired` and back
//! to fresh on the next sighting; there is no terminal state. A key is never
//! permanently blacklisted: once the debounce window has elapsed, the
//! suppression lifts and the item is eligible again.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Why a duplicate check came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Key never seen before
    New,
    /// Key seen within the debounce window; suppress
    Debounced,
    /// Key seen, but the window has elapsed; eligible again
    Expired,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reason::New => "new",
            Reason::Debounced => "debounced",
            Reason::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Per-source dedup history: key -> unix timestamp of the last sighting.
///
/// Bounded to `max_size` records with deterministic FIFO eviction by
/// insertion order. Timestamps are unix seconds as `f64`, matching the
/// persisted representation.
#[derive(Debug, Clone)]
pub struct History {
    max_size: usize,
    debounce_secs: f64,
    retention_multiplier: f64,
    records: HashMap<String, f64>,
    /// Insertion order for FIFO eviction. May hold keys already removed by
    /// the hygiene sweep; those are skipped when evicting.
    order: VecDeque<String>,
}

impl History {
    /// Create an empty history.
    pub fn new(max_size: usize, debounce_secs: f64, retention_multiplier: f64) -> Self {
        Self {
            max_size: max_size.max(1),
            debounce_secs,
            retention_multiplier: retention_multiplier.max(1.0),
            records: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Rebuild a history from persisted records.
    ///
    /// Insertion order is reconstructed oldest-timestamp-first (ties broken
    /// by key) so eviction stays deterministic across restarts; the result
    /// is trimmed to `max_size`.
    pub fn from_records(
        records: HashMap<String, f64>,
        max_size: usize,
        debounce_secs: f64,
        retention_multiplier: f64,
    ) -> Self {
        let mut entries: Vec<(String, f64)> = records.iter().map(|(k, &v)| (k.clone(), v)).collect();
        entries.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut history = Self {
            max_size: max_size.max(1),
            debounce_secs,
            retention_multiplier: retention_multiplier.max(1.0),
            records,
            order: entries.into_iter().map(|(k, _)| k).collect(),
        };
        history.trim_to_max();
        history
    }

    /// Check whether a key should be suppressed at `now`.
    ///
    /// - absent key: `(false, New)`
    /// - within the debounce window: `(true, Debounced)`
    /// - window elapsed: `(false, Expired)` — the suppression lifts
    pub fn is_duplicate(&self, key: &str, now: f64) -> (bool, Reason) {
        match self.records.get(key) {
            None => (false, Reason::New),
            Some(&last_seen) => {
                if now - last_seen < self.debounce_secs {
                    (true, Reason::Debounced)
                } else {
                    (false, Reason::Expired)
                }
            }
        }
    }

    /// Record a sighting of `key` at `now`.
    ///
    /// Refreshing an existing key never decreases its timestamp and does not
    /// change its insertion order. A new key that pushes the store past
    /// `max_size` triggers FIFO eviction of the oldest-inserted records.
    pub fn mark_seen(&mut self, key: &str, now: f64) {
        if let Some(last_seen) = self.records.get_mut(key) {
            if now > *last_seen {
                *last_seen = now;
            }
            return;
        }

        self.records.insert(key.to_string(), now);
        self.order.push_back(key.to_string());
        self.trim_to_max();
    }

    fn trim_to_max(&mut self) {
        while self.records.len() > self.max_size {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.records.remove(&oldest);
        }
    }

    /// Memory-hygiene sweep: drop records whose last sighting is older than
    /// `debounce * retention_multiplier`. The multiplier is clamped to >= 1,
    /// so a record still inside the debounce window is never removed.
    ///
    /// Returns the number of records dropped.
    pub fn cleanup_expired(&mut self, now: f64) -> usize {
        let cutoff = now - self.debounce_secs * self.retention_multiplier;
        let before = self.records.len();
        self.records.retain(|_, last_seen| *last_seen >= cutoff);
        let removed = before - self.records.len();
        if removed > 0 {
            self.order.retain(|k| self.records.contains_key(k));
            log::debug!("Cleaned up {} expired dedup records", removed);
        }
        removed
    }

    /// Number of records currently held.
    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Last sighting of `key`, if recorded.
    pub fn last_seen(&self, key: &str) -> Option<f64> {
        self.records.get(key).copied()
    }

    /// Drop all records.
    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    /// Export the records for persistence or display.
    pub fn to_records(&self) -> HashMap<String, f64> {
        self.records.clone()
    }

    pub fn debounce_secs(&self) -> f64 {
        self.debounce_secs
    }
}
