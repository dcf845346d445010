// src/engine.rs

//! Engine façade: the single decision API over key generation, history and
//! persistence.
//!
//! One `Engine` serves every configured source. Each source's history (and
//! its persisted file) is guarded by its own lock; the polling actor and the
//! command actor both go through this façade for any read-modify-write, and
//! persistence happens inside the locked section so two writers can never
//! interleave their output.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::dedup::{History, generate_key};
use crate::error::Result;
use crate::models::{Decision, FeedItem};
use crate::storage::{HistoryParams, StateStorage};

/// Per-source mutable state, guarded by one lock.
struct SourceEntry {
    history: History,
    /// Keys already decided deliver=true in the current polling cycle, so
    /// an item matching several trigger rules is sent once. Never persisted.
    cycle_delivered: HashSet<String>,
}

/// Deduplication engine for all configured sources.
pub struct Engine {
    config: EngineConfig,
    storage: Arc<dyn StateStorage>,
    sources: Mutex<HashMap<String, Arc<Mutex<SourceEntry>>>>,
}

impl Engine {
    pub fn new(config: EngineConfig, storage: Arc<dyn StateStorage>) -> Self {
        Self {
            config,
            storage,
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Current time as unix seconds.
    pub fn unix_now() -> f64 {
        let now = Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
    }

    fn params(&self) -> HistoryParams {
        HistoryParams {
            max_size: self.config.max_size,
            debounce_secs: self.config.debounce_secs(),
            retention_multiplier: self.config.retention_multiplier,
        }
    }

    /// Get or lazily reconstruct the entry for a source. The registry lock
    /// is held across the load so a source is never loaded twice.
    async fn entry(&self, source_id: &str) -> Arc<Mutex<SourceEntry>> {
        let mut sources = self.sources.lock().await;
        if let Some(entry) = sources.get(source_id) {
            return entry.clone();
        }

        let history = self
            .storage
            .load_state(source_id, &self.params(), Self::unix_now())
            .await;
        if !history.is_empty() {
            log::info!(
                "Loaded {} dedup records for source {}",
                history.size(),
                source_id
            );
        }

        let entry = Arc::new(Mutex::new(SourceEntry {
            history,
            cycle_delivered: HashSet::new(),
        }));
        sources.insert(source_id.to_string(), entry.clone());
        entry
    }

    /// Decide whether `item` should be delivered for `source_id` at `now`.
    ///
    /// A deliverable item is marked seen and the state is persisted before
    /// the decision is returned. Persistence failures are logged at error
    /// severity and do not suppress the decision: in-memory dedup keeps
    /// working and the state is written again on the next sighting.
    pub async fn evaluate(&self, source_id: &str, item: &FeedItem, now: f64) -> Decision {
        let (key, trace) = generate_key(item, &self.config.extra_tracking_prefixes);
        if self.config.enable_debug_logging {
            log::debug!("source {}: key trace {:?}", source_id, trace);
        }

        let entry = self.entry(source_id).await;
        let mut entry = entry.lock().await;

        if entry.cycle_delivered.contains(&key) {
            return Decision {
                deliver: false,
                key,
                reason: "cycle".to_string(),
            };
        }

        let (duplicate, reason) = entry.history.is_duplicate(&key, now);
        if duplicate {
            return Decision {
                deliver: false,
                key,
                reason: reason.to_string(),
            };
        }

        entry.history.mark_seen(&key, now);
        entry.cycle_delivered.insert(key.clone());

        if let Err(e) = self.storage.save_state(source_id, &entry.history).await {
            log::error!(
                "Failed to persist dedup state for source {}: {} (in-memory history stays valid)",
                source_id,
                e
            );
        }

        Decision {
            deliver: true,
            key,
            reason: reason.to_string(),
        }
    }

    /// Start a new polling cycle for a source: forget which keys were
    /// delivered in the previous pass.
    pub async fn begin_cycle(&self, source_id: &str) {
        let entry = self.entry(source_id).await;
        entry.lock().await.cycle_delivered.clear();
    }

    /// Clear a source's history (command-actor path) and persist the empty
    /// state.
    pub async fn clear_history(&self, source_id: &str) -> Result<()> {
        let entry = self.entry(source_id).await;
        let mut entry = entry.lock().await;
        entry.history.clear();
        entry.cycle_delivered.clear();
        self.storage.save_state(source_id, &entry.history).await
    }

    /// Run the memory-hygiene sweep and persist if anything was dropped.
    pub async fn cleanup(&self, source_id: &str, now: f64) -> Result<()> {
        let entry = self.entry(source_id).await;
        let mut entry = entry.lock().await;
        if entry.history.cleanup_expired(now) > 0 {
            self.storage.save_state(source_id, &entry.history).await?;
        }
        Ok(())
    }

    /// Snapshot a source's records for display, newest first. The copy is
    /// taken under the lock; formatting happens outside it.
    pub async fn snapshot(&self, source_id: &str) -> Vec<(String, f64)> {
        let entry = self.entry(source_id).await;
        let records = entry.lock().await.history.to_records();

        let mut records: Vec<(String, f64)> = records.into_iter().collect();
        records.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        records
    }

    /// Forget a deleted source and remove its persisted state.
    pub async fn remove_source(&self, source_id: &str) -> Result<()> {
        self.sources.lock().await.remove(source_id);
        self.storage.delete_state(source_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::storage::LocalStateStore;
    use tempfile::TempDir;

    const HOUR: f64 = 3600.0;
    const T0: f64 = 1700000000.0;

    fn engine_in(dir: &TempDir) -> Engine {
        Engine::new(
            EngineConfig::default(),
            Arc::new(LocalStateStore::new(dir.path())),
        )
    }

    fn item(link: &str) -> FeedItem {
        FeedItem {
            link: Some(link.to_string()),
            ..FeedItem::default()
        }
    }

    #[tokio::test]
    async fn first_sighting_delivers() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);

        let decision = engine
            .evaluate("src", &item("https://example.com/p"), T0)
            .await;
        assert!(decision.deliver);
        assert_eq!(decision.reason, "new");
        assert_eq!(decision.key, "link:https://example.com/p:author:");
    }

    #[tokio::test]
    async fn resighting_within_window_is_suppressed() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);
        let it = item("https://example.com/p");

        assert!(engine.evaluate("src", &it, T0).await.deliver);
        engine.begin_cycle("src").await;

        let decision = engine.evaluate("src", &it, T0 + HOUR).await;
        assert!(decision.suppressed());
        assert_eq!(decision.reason, "debounced");
    }

    #[tokio::test]
    async fn expired_window_delivers_again() {
        // Regression guard for the permanent-suppression bug: once the
        // debounce window elapses, the same item must be delivered again.
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);
        let it = item("https://example.com/p");

        assert!(engine.evaluate("src", &it, T0).await.deliver);
        engine.begin_cycle("src").await;

        let decision = engine.evaluate("src", &it, T0 + 24.0 * HOUR).await;
        assert!(decision.deliver, "expired suppression must lift");
        assert_eq!(decision.reason, "expired");
    }

    #[tokio::test]
    async fn multi_match_in_one_cycle_sends_once() {
        // One item matching three independent trigger rules in the same
        // polling pass yields exactly one deliver=true decision.
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);
        let it = item("https://example.com/p");

        engine.begin_cycle("src").await;
        let mut delivered = 0;
        for _ in 0..3 {
            if engine.evaluate("src", &it, T0).await.deliver {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);

        let last = engine.evaluate("src", &it, T0).await;
        assert_eq!(last.reason, "cycle");
    }

    #[tokio::test]
    async fn state_survives_restart() {
        let tmp = TempDir::new().unwrap();
        let it = item("https://example.com/p");

        {
            let engine = engine_in(&tmp);
            assert!(engine.evaluate("src", &it, T0).await.deliver);
        }

        // New engine over the same directory, as after a process restart
        let engine = engine_in(&tmp);
        let decision = engine.evaluate("src", &it, T0 + 1.0).await;
        assert!(decision.suppressed());
        assert_eq!(decision.reason, "debounced");
    }

    #[tokio::test]
    async fn sources_are_independent_namespaces() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);
        let it = item("https://example.com/p");

        assert!(engine.evaluate("src-a", &it, T0).await.deliver);
        assert!(engine.evaluate("src-b", &it, T0).await.deliver);
    }

    #[tokio::test]
    async fn clear_history_makes_items_new_again() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);
        let it = item("https://example.com/p");

        assert!(engine.evaluate("src", &it, T0).await.deliver);
        engine.clear_history("src").await.unwrap();
        engine.begin_cycle("src").await;

        let decision = engine.evaluate("src", &it, T0 + 1.0).await;
        assert!(decision.deliver);
        assert_eq!(decision.reason, "new");
    }

    #[tokio::test]
    async fn remove_source_deletes_persisted_state() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);

        assert!(
            engine
                .evaluate("src", &item("https://example.com/p"), T0)
                .await
                .deliver
        );
        assert!(tmp.path().join("src.json").exists());

        engine.remove_source("src").await.unwrap();
        assert!(!tmp.path().join("src.json").exists());
    }

    #[tokio::test]
    async fn snapshot_is_newest_first() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);

        engine
            .evaluate("src", &item("https://example.com/a"), T0)
            .await;
        engine
            .evaluate("src", &item("https://example.com/b"), T0 + 10.0)
            .await;

        let snapshot = engine.snapshot("src").await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].0.contains("/b"));
        assert_eq!(snapshot[0].1, T0 + 10.0);
    }

    /// Storage double whose saves always fail.
    struct BrokenStorage;

    #[async_trait::async_trait]
    impl StateStorage for BrokenStorage {
        async fn load_state(&self, _: &str, params: &HistoryParams, _: f64) -> History {
            History::new(
                params.max_size,
                params.debounce_secs,
                params.retention_multiplier,
            )
        }

        async fn save_state(&self, _: &str, _: &History) -> crate::error::Result<()> {
            Err(AppError::config("disk full"))
        }

        async fn delete_state(&self, _: &str) -> crate::error::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn persistence_failure_does_not_break_dedup() {
        let engine = Engine::new(EngineConfig::default(), Arc::new(BrokenStorage));
        let it = item("https://example.com/p");

        // Decision still comes back despite the failed save
        assert!(engine.evaluate("src", &it, T0).await.deliver);

        // In-memory dedup keeps working
        engine.begin_cycle("src").await;
        let decision = engine.evaluate("src", &it, T0 + 1.0).await;
        assert!(decision.suppressed());
        assert_eq!(decision.reason, "debounced");
    }

    #[tokio::test]
    async fn cleanup_persists_only_when_something_dropped() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_in(&tmp);
        let it = item("https://example.com/p");

        assert!(engine.evaluate("src", &it, T0).await.deliver);
        // Nothing old enough yet (retention is 2x the 24h window)
        engine.cleanup("src", T0 + HOUR).await.unwrap();
        assert_eq!(engine.snapshot("src").await.len(), 1);

        engine.cleanup("src", T0 + 100.0 * 24.0 * HOUR).await.unwrap();
        assert!(engine.snapshot("src").await.is_empty());
    }
}
