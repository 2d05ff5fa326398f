//! Crash-recovery snapshots of the history stacks.
//!
//! The snapshot stores the delta stacks themselves, not the folded
//! annotation list — the list comes from the persistence collaborator at
//! startup; the snapshot restores undo-ability across a restart.

use super::{Storage, StorageError, StorageResult};
use crate::history::{now_millis, Delta, History};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Fixed storage key for the recovery snapshot.
pub const RECOVERY_KEY: &str = "redline.history";

/// Snapshots older than this are discarded at startup rather than restored,
/// so a stale session cannot resurrect.
pub const SNAPSHOT_MAX_AGE_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// The serialized form of a recovery snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySnapshot {
    pub undo: Vec<Delta>,
    pub redo: Vec<Delta>,
    pub timestamp_millis: u64,
}

/// Persists the history stacks after every mutation and restores them once
/// at startup.
pub struct RecoveryManager {
    storage: Arc<dyn Storage>,
    key: String,
}

impl RecoveryManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_key(storage, RECOVERY_KEY)
    }

    pub fn with_key(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Serialize and store the current stacks.
    pub fn persist(&self, history: &History) -> StorageResult<()> {
        let snapshot = RecoverySnapshot {
            undo: history.undo_stack().to_vec(),
            redo: history.redo_stack().to_vec(),
            timestamp_millis: now_millis(),
        };
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.storage.save(&self.key, &json)
    }

    /// Load the stored snapshot, if it is present, parseable, and fresh.
    ///
    /// A corrupt or expired snapshot is discarded with a warning; startup
    /// never fails because of it.
    pub fn load(&self) -> Option<RecoverySnapshot> {
        let json = match self.storage.load(&self.key) {
            Ok(json) => json,
            Err(StorageError::NotFound(_)) => return None,
            Err(e) => {
                log::warn!("recovery snapshot unreadable, ignoring: {e}");
                return None;
            }
        };

        let snapshot: RecoverySnapshot = match serde_json::from_str(&json) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("recovery snapshot corrupt, discarding: {e}");
                let _ = self.storage.delete(&self.key);
                return None;
            }
        };

        let age = now_millis().saturating_sub(snapshot.timestamp_millis);
        if age > SNAPSHOT_MAX_AGE_MILLIS {
            log::warn!("recovery snapshot is {age} ms old, discarding");
            let _ = self.storage.delete(&self.key);
            return None;
        }

        Some(snapshot)
    }

    /// Remove any stored snapshot.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(&self.key)
    }
}
