/*!
Data model for a backup run.

Everything here is transient: candidates are derived from live discovery, the
run result is built fresh per invocation and consumed by the reporter. The
only durable state the orchestrator relies on are the tags already attached
to prior snapshots, which the pruner reads back.
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag key recording the originating instance on a snapshot
pub const TAG_INSTANCE_ID: &str = "InstanceId";

/// Tag key carrying the ISO-8601 creation timestamp; the retention lifecycle marker
pub const TAG_BACKUP_DATE: &str = "BackupDate";

/// A compute instance selected for backup, resolved to its backing volume
///
/// `volume_id` is present only when the instance has an attached device
/// matching the configured selection strategy; candidates without one are
/// skipped downstream, never errored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupCandidate {
    pub instance_id: String,
    pub volume_id: Option<String>,
    pub volume_size_gib: Option<i64>,
}

impl BackupCandidate {
    pub fn has_volume(&self) -> bool {
        self.volume_id.is_some()
    }
}

/// A lifecycle-tagged snapshot as seen by the retention pruner
///
/// Owned by the snapshot service for its entire life; the orchestrator never
/// mutates it after creation except to delete it during pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub snapshot_id: String,
    pub source_instance_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub size_gib: Option<i64>,
}

/// Metadata exported to object storage for one snapshot, write-once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub snapshot_id: String,
    pub instance_id: String,
    pub created_at: DateTime<Utc>,
}

impl SnapshotSummary {
    /// Object-storage key for this summary
    pub fn object_key(&self) -> String {
        format!("snapshots/{}.json", self.snapshot_id)
    }
}

/// Terminal classification of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure,
}

/// Aggregated statistics for one invocation, consumed by the reporter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Snapshot ids in creation order
    pub created_snapshot_ids: Vec<String>,
    /// Total provisioned storage across created snapshots, in GiB
    pub total_storage_gib: i64,
    /// Per-item failures tolerated during the run (isolated candidates,
    /// failed prune deletions)
    pub failure_count: u32,
    pub outcome: RunOutcome,
}

impl RunResult {
    pub fn snapshot_count(&self) -> usize {
        self.created_snapshot_ids.len()
    }
}

/// Body of the value returned to the external scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Message { message: String },
    Error { error: String },
}

/// The only value returned to the external scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: ResponseBody,
}

impl InvocationResponse {
    /// A 200 response with a completion message
    pub fn success<S: Into<String>>(message: S) -> Self {
        InvocationResponse {
            status_code: 200,
            body: ResponseBody::Message {
                message: message.into(),
            },
        }
    }

    /// A 500 response carrying the run's error message
    pub fn failure<S: Into<String>>(error: S) -> Self {
        InvocationResponse {
            status_code: 500,
            body: ResponseBody::Error {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}
