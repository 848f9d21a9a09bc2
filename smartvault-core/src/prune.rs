/*!
Retention pruning of lifecycle-tagged snapshots.

Operates on the whole tagged snapshot population, whichever run created it,
so retention stays idempotent across overlapping invocations. Deletions are
isolated per snapshot: one failure is logged and counted, and evaluation
continues. A snapshot that is already gone counts as pruned work done by
someone else, not as an error.
*/

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::model::TAG_BACKUP_DATE;
use crate::services::{DeleteOutcome, SnapshotService};
use crate::Result;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// What one retention pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Tagged snapshots evaluated
    pub examined: usize,
    /// Ids deleted by this pass
    pub deleted: Vec<String>,
    /// Expired snapshots whose deletion failed
    pub failed: u32,
}

/// Delete every tagged snapshot strictly older than the retention window
///
/// Age is `(now − creation timestamp)` in days; a snapshot exactly
/// `retention_days` old is retained. A window of zero deletes everything
/// already tagged, including snapshots created moments ago.
pub async fn prune_expired(
    snapshots: &dyn SnapshotService,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<PruneReport> {
    info!(retention_days, "Cleaning up old snapshots");

    let records = snapshots.snapshots_with_tag_key(TAG_BACKUP_DATE).await?;
    let examined = records.len();

    let mut deleted = Vec::new();
    let mut failed = 0u32;

    for record in records {
        let age_days =
            (now - record.created_at).num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0);
        if age_days <= retention_days as f64 {
            continue;
        }

        match snapshots.delete_snapshot(&record.snapshot_id).await {
            Ok(DeleteOutcome::Deleted) => {
                info!(
                    snapshot_id = %record.snapshot_id,
                    age_days = age_days,
                    "Deleted old snapshot"
                );
                deleted.push(record.snapshot_id);
            }
            Ok(DeleteOutcome::AlreadyGone) => {
                debug!(
                    snapshot_id = %record.snapshot_id,
                    "Snapshot already deleted by another invocation"
                );
            }
            Err(err) => {
                warn!(
                    snapshot_id = %record.snapshot_id,
                    error = %err,
                    "Failed to delete old snapshot; continuing"
                );
                failed += 1;
            }
        }
    }

    info!(
        examined = examined,
        deleted = deleted.len(),
        failed = failed,
        "Retention pass completed"
    );
    Ok(PruneReport {
        examined,
        deleted,
        failed,
    })
}
