use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use civicmap_common::{CivicMapError, Issue};

use crate::store::{IssuePatch, IssueStore};

/// Entries that fail this many drain attempts are dropped with a warning
/// rather than retried forever.
pub const MAX_SYNC_ATTEMPTS: u32 = 5;

const QUEUE_FILE: &str = "civic-offline-queue.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum PendingMutation {
    Create { issue: Issue },
    Update { id: String, patch: IssuePatch },
    Delete { id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    pub mutation: PendingMutation,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub synced: usize,
    pub failed: usize,
    pub dropped: usize,
}

/// Durable FIFO of mutations made while the remote store was
/// unreachable. Persisted as a JSON file under the data dir; an entry
/// leaves the file only after the remote call succeeds (or its retry
/// budget is exhausted).
pub struct OfflineQueue {
    path: PathBuf,
    entries: Vec<QueueEntry>,
}

impl OfflineQueue {
    pub fn open(data_dir: &Path) -> Result<Self, CivicMapError> {
        fs::create_dir_all(data_dir)
            .map_err(|e| CivicMapError::Queue(format!("creating {}: {e}", data_dir.display())))?;
        let path = data_dir.join(QUEUE_FILE);

        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| CivicMapError::Queue(format!("reading queue file: {e}")))?;
            match serde_json::from_str::<Vec<QueueEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Offline queue file corrupt; starting empty");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        if !entries.is_empty() {
            info!(pending = entries.len(), "Loaded offline queue");
        }
        Ok(Self { path, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    /// Append a pending mutation and persist immediately.
    pub fn enqueue(&mut self, mutation: PendingMutation) -> Result<&QueueEntry, CivicMapError> {
        let entry = QueueEntry {
            id: format!("queue-{}", Uuid::new_v4()),
            mutation,
            created_at: Utc::now(),
            attempts: 0,
        };
        self.entries.push(entry);
        self.persist()?;
        Ok(self.entries.last().expect("entry just pushed"))
    }

    /// Replay pending mutations in insertion order. Called once per
    /// offline→online transition. Each entry is removed from memory and
    /// disk only after its remote call resolves; a failed entry stays
    /// queued for the next transition until its attempts run out.
    pub async fn drain(&mut self, store: &dyn IssueStore) -> Result<DrainReport, CivicMapError> {
        if self.entries.is_empty() {
            return Ok(DrainReport::default());
        }
        info!(pending = self.entries.len(), "Syncing offline queue");

        let mut report = DrainReport::default();
        let mut remaining = Vec::new();

        for mut entry in std::mem::take(&mut self.entries) {
            let result = match &entry.mutation {
                PendingMutation::Create { issue } => store.create(issue).await.map(|_| ()),
                PendingMutation::Update { id, patch } => {
                    store.update(id, patch).await.map(|_| ())
                }
                PendingMutation::Delete { id } => store.delete(id).await,
            };

            match result {
                Ok(()) => {
                    report.synced += 1;
                }
                Err(e) => {
                    entry.attempts += 1;
                    if entry.attempts >= MAX_SYNC_ATTEMPTS {
                        warn!(entry = %entry.id, error = %e, attempts = entry.attempts,
                              "Dropping offline entry after exhausting retries");
                        report.dropped += 1;
                    } else {
                        warn!(entry = %entry.id, error = %e, attempts = entry.attempts,
                              "Offline entry sync failed; will retry");
                        report.failed += 1;
                        remaining.push(entry);
                    }
                }
            }
        }

        self.entries = remaining;
        self.persist()?;
        Ok(report)
    }

    fn persist(&self) -> Result<(), CivicMapError> {
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| CivicMapError::Queue(format!("serializing queue: {e}")))?;
        fs::write(&self.path, json)
            .map_err(|e| CivicMapError::Queue(format!("writing queue file: {e}")))
    }
}
