//! Persistence for per-source dedup state.
//!
//! On disk, each source owns one JSON document:
//!
//! ```text
//! {
//!   "dedup_history": { "<key>": <unix_timestamp_float>, ... },
//!   "notified_posts": [ "<identifier>", ... ]   // derived, for older readers
//! }
//! ```
//!
//! `notified_posts` is the legacy timestamp-less representation. It is
//! derived from `dedup_history` on every save so downgraded readers keep
//! working, and it is only read back when `dedup_history` is absent
//! (migration from a pre-timestamp install).

pub mod local;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dedup::History;
use crate::error::Result;

// Re-export for convenience
pub use local::LocalStateStore;

/// History construction parameters, taken from the engine config.
#[derive(Debug, Clone, Copy)]
pub struct HistoryParams {
    pub max_size: usize,
    pub debounce_secs: f64,
    pub retention_multiplier: f64,
}

impl HistoryParams {
    fn empty_history(&self) -> History {
        History::new(self.max_size, self.debounce_secs, self.retention_multiplier)
    }
}

/// Current on-disk payload for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceState {
    /// Dedup key -> unix timestamp (float seconds) of the last sighting
    pub dedup_history: HashMap<String, f64>,

    /// Flat identifier list derived from `dedup_history`, kept for
    /// downgrade compatibility
    #[serde(default)]
    pub notified_posts: Vec<String>,
}

/// Every persisted shape the adapter can read, decoded explicitly.
///
/// Variants are tried in order: the timestamped payload requires
/// `dedup_history`, so a legacy document can never be mistaken for it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PersistedState {
    /// Current format
    Timestamped(SourceState),
    /// Legacy object holding only the flat seen-list
    LegacyMap { notified_posts: Vec<String> },
    /// Oldest format: a bare list of seen identifiers
    LegacyList(Vec<String>),
}

/// Decode persisted bytes into a history.
///
/// Legacy identifiers migrate with `last_seen = now`, so nothing becomes
/// eligible for re-delivery just because the process was upgraded.
/// Malformed input is logged and yields an empty history; corrupted state
/// must never block a source from operating.
pub fn decode_state(bytes: &[u8], params: &HistoryParams, now: f64) -> History {
    match serde_json::from_slice::<PersistedState>(bytes) {
        Ok(PersistedState::Timestamped(state)) => History::from_records(
            state.dedup_history,
            params.max_size,
            params.debounce_secs,
            params.retention_multiplier,
        ),
        Ok(PersistedState::LegacyMap { notified_posts })
        | Ok(PersistedState::LegacyList(notified_posts)) => {
            log::info!(
                "Migrating {} legacy seen-identifiers into timestamped history",
                notified_posts.len()
            );
            let records = notified_posts.into_iter().map(|id| (id, now)).collect();
            History::from_records(
                records,
                params.max_size,
                params.debounce_secs,
                params.retention_multiplier,
            )
        }
        Err(e) => {
            log::warn!("Unreadable dedup state ({}); starting with empty history", e);
            params.empty_history()
        }
    }
}

/// Produce the on-disk payload for a history.
pub fn encode_state(history: &History) -> SourceState {
    let dedup_history = history.to_records();
    let mut notified_posts: Vec<String> = dedup_history.keys().cloned().collect();
    notified_posts.sort();
    SourceState {
        dedup_history,
        notified_posts,
    }
}

/// Trait for dedup state storage backends.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Load a source's history, migrating legacy payloads and recovering
    /// from corruption with an empty history. Infallible by contract.
    async fn load_state(&self, source_id: &str, params: &HistoryParams, now: f64) -> History;

    /// Persist a source's history. Write failures are surfaced; the
    /// in-memory history stays valid and is retried on the next save.
    async fn save_state(&self, source_id: &str, history: &History) -> Result<()>;

    /// Delete a source's persisted state (source removed by the config
    /// layer). Missing state is not an error.
    async fn delete_state(&self, source_id: &str) -> Result<()>;
}
