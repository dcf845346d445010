//! Local filesystem state store.
//!
//! One `<source_id>.json` per source under the root directory. Writes are
//! atomic: the payload goes to a temporary file in the same directory, is
//! forced to disk, the previous file is kept as a `.bak` copy, and the
//! temporary file is renamed over the target. A reader observes either the
//! old document or the new one, never a partial write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::dedup::History;
use crate::error::Result;

use super::{HistoryParams, StateStorage, decode_state, encode_state};

/// Filesystem-backed dedup state storage.
#[derive(Debug, Clone)]
pub struct LocalStateStore {
    root_dir: PathBuf,
}

impl LocalStateStore {
    /// Create a store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// State file path for a source id.
    fn state_path(&self, source_id: &str) -> PathBuf {
        self.root_dir.join(format!("{}.json", sanitize_id(source_id)))
    }

    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root_dir).await?;
        Ok(())
    }

    /// Write bytes atomically: temp file, fsync, `.bak` of the previous
    /// file, then rename over the target.
    pub async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("json.tmp");

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), std::io::Error>(())
        }
        .await;

        if let Err(e) = write_result {
            // Target untouched; drop the partial temp file
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let bak = path.with_extension("json.bak");
            if let Err(e) = tokio::fs::copy(path, &bak).await {
                log::warn!("Failed to keep backup copy {:?}: {}", bak, e);
            }
        }

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Keep source ids filesystem-safe.
fn sanitize_id(source_id: &str) -> String {
    source_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl StateStorage for LocalStateStore {
    async fn load_state(&self, source_id: &str, params: &HistoryParams, now: f64) -> History {
        let path = self.state_path(source_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => decode_state(&bytes, params, now),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => History::new(
                params.max_size,
                params.debounce_secs,
                params.retention_multiplier,
            ),
            Err(e) => {
                log::warn!(
                    "Failed to read dedup state {:?}: {}; starting with empty history",
                    path,
                    e
                );
                History::new(
                    params.max_size,
                    params.debounce_secs,
                    params.retention_multiplier,
                )
            }
        }
    }

    async fn save_state(&self, source_id: &str, history: &History) -> Result<()> {
        let state = encode_state(history);
        let bytes = serde_json::to_vec_pretty(&state)?;
        self.ensure_root().await?;
        Self::atomic_write(&self.state_path(source_id), &bytes).await
    }

    async fn delete_state(&self, source_id: &str) -> Result<()> {
        let path = self.state_path(source_id);
        for target in [path.clone(), path.with_extension("json.bak")] {
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
