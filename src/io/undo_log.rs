use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::io::atomic_write;
use crate::io::task_store::StoreError;
use crate::model::config::MAX_UNDO_SECONDS;
use crate::model::task::Task;

const UNDO_DIR: &str = "undo";

/// Capability to reverse a completed destructive action until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoToken {
    pub id: String,
    pub summary: String,
    pub expires_at: DateTime<Utc>,
    /// Lifetime the token was issued with, in seconds
    pub duration_secs: u64,
}

impl UndoToken {
    pub fn issue(summary: impl Into<String>, now: DateTime<Utc>, duration_secs: u64) -> Self {
        let duration_secs = duration_secs.min(MAX_UNDO_SECONDS);
        UndoToken {
            id: uuid::Uuid::new_v4().simple().to_string()[..12].to_string(),
            summary: summary.into(),
            expires_at: now + Duration::seconds(duration_secs as i64),
            duration_secs,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining lifetime, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }
}

/// A subtree taken out of the tree and where it sat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedTask {
    /// `None` for a top-level task
    pub parent_id: Option<String>,
    /// Index among its siblings before removal
    pub position: usize,
    pub task: Task,
}

/// Dependency references dropped from a surviving task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrippedRefs {
    pub id: String,
    pub dependencies: Vec<String>,
}

/// Everything a delete changed, stored at `.taskdeck/undo/<token>.json`
/// until it is redeemed or pruned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoRecord {
    pub token: UndoToken,
    pub tag: String,
    pub removed: Vec<RemovedTask>,
    #[serde(default)]
    pub stripped: Vec<StrippedRefs>,
}

fn undo_dir(deck_dir: &Path) -> PathBuf {
    deck_dir.join(UNDO_DIR)
}

fn record_path(deck_dir: &Path, token_id: &str) -> PathBuf {
    undo_dir(deck_dir).join(format!("{}.json", token_id))
}

pub fn write_record(deck_dir: &Path, record: &UndoRecord) -> Result<(), StoreError> {
    let path = record_path(deck_dir, &record.token.id);
    let json = serde_json::to_string(record).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    atomic_write(&path, json.as_bytes()).map_err(|source| StoreError::Io { path, source })
}

/// Remove and return the record for `token_id`. `Ok(None)` when no record
/// exists. The file is deleted whether or not the caller can still use it.
pub fn take_record(deck_dir: &Path, token_id: &str) -> Result<Option<UndoRecord>, StoreError> {
    if token_id.is_empty() || token_id.contains(['/', '\\', '.']) {
        return Ok(None);
    }
    let path = record_path(deck_dir, token_id);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::Io { path, source }),
    };
    let _ = fs::remove_file(&path);
    match serde_json::from_str(&text) {
        Ok(record) => Ok(Some(record)),
        Err(source) => Err(StoreError::Json { path, source }),
    }
}

/// Delete records that expired before `now`. Returns the number removed.
pub fn prune_expired(deck_dir: &Path, now: DateTime<Utc>) -> usize {
    let Ok(entries) = fs::read_dir(undo_dir(deck_dir)) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let expired = fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<UndoRecord>(&text).ok())
            .map(|r| r.token.is_expired(now))
            .unwrap_or(true);
        if expired && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!(removed, "pruned expired undo records");
    }
    removed
}
