//! C5 — Persistent State Store.
//!
//! Durable snapshot of identity, metrics, and recent thoughts, written
//! atomically (write-to-temp + rename) to a local directory rather than
//! to an external store — the data model here (`snapshot.*` keys, "temp
//! + rename", "reads tolerate missing files") describes filesystem
//! durability directly (§4.7, §6), so this diverges from the teacher's
//! Redis-backed store while keeping its shape: a thin client, generic
//! save/load helpers, and a thiserror error enum.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::core::types::{PersistentSnapshot, SCHEMA_VERSION};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("snapshot schema version {found} is newer than the {supported} this build understands")]
    SnapshotTooNew { found: u32, supported: u32 },
}

/// Writes and reads a single `PersistentSnapshot` under `dir/snapshot.json`.
/// Held across I/O intentionally (§5 — "the C5 save lock is held across
/// I/O to serialize writes"), so this wraps its own mutex rather than
/// relying on the caller to provide one.
pub struct PersistentStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl PersistentStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.json")
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join("snapshot.json.tmp")
    }

    /// Atomically writes `snapshot`: serialize to a temp file in the
    /// same directory, then rename over the committed file so a reader
    /// never observes a partial write.
    pub async fn save(&self, snapshot: &PersistentSnapshot) -> Result<(), PersistenceError> {
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, self.snapshot_path()).await?;
        Ok(())
    }

    /// Returns the latest committed snapshot, or a well-formed empty
    /// value if none has ever been saved (§4.7). A snapshot with a
    /// newer schema version than this build understands is refused;
    /// the caller proceeds with an empty snapshot (§4.7's upgrade rule).
    pub async fn load(&self, identity_name: &str) -> Result<PersistentSnapshot, PersistenceError> {
        let _guard = self.lock.lock().await;
        let path = self.snapshot_path();
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(PersistentSnapshot::empty(identity_name));
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: PersistentSnapshot = serde_json::from_slice(&body)?;
        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(PersistenceError::SnapshotTooNew {
                found: snapshot.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// `load`, but degrades `SnapshotTooNew` to an empty snapshot rather
    /// than surfacing an error, per §4.7: "the process proceeds with an
    /// empty snapshot and surfaces a `SnapshotTooNew` error" — the error
    /// is still returned for the caller to log/report, alongside the
    /// usable empty snapshot.
    pub async fn load_or_empty(
        &self,
        identity_name: &str,
    ) -> (PersistentSnapshot, Option<PersistenceError>) {
        match self.load(identity_name).await {
            Ok(snapshot) => (snapshot, None),
            Err(err @ PersistenceError::SnapshotTooNew { .. }) => {
                (PersistentSnapshot::empty(identity_name), Some(err))
            }
            Err(err) => (PersistentSnapshot::empty(identity_name), Some(err)),
        }
    }
}

/// Retries `save` with exponential backoff up to three times before
/// surfacing failure (§7 — `PersistError` policy). Never aborts the
/// tick loop: callers treat the returned `Err` as something to log and
/// report via the event queue, not a fatal condition.
pub async fn save_with_retry(
    store: &PersistentStore,
    snapshot: &PersistentSnapshot,
) -> Result<(), PersistenceError> {
    let mut delay = std::time::Duration::from_millis(100);
    let mut last_err = None;
    for _attempt in 0..3 {
        match store.save(snapshot).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
    Err(last_err.expect("loop ran at least once"))
}

#[must_use]
pub fn default_storage_dir(base: &Path) -> PathBuf {
    base.join("echobeats")
}
