/*!
Snapshot lifecycle: create, tag, replicate, export.

For each candidate with a volume this creates one tagged snapshot, then runs
the optional stages: cross-region replication and metadata export. A failed
volume-size lookup counts the snapshot as zero storage instead of aborting;
replication and export failures propagate to the caller, which decides
whether the candidate is isolated or the run aborts.
*/

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::config::BackupConfig;
use crate::model::{BackupCandidate, SnapshotSummary, TAG_BACKUP_DATE, TAG_INSTANCE_ID};
use crate::services::{ComputeInventory, MetadataExport, SnapshotService};
use crate::{Result, VaultError};

/// What one candidate's backup produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub snapshot_id: String,
    /// Provisioned volume size, or zero when telemetry is off or the lookup failed
    pub size_gib: i64,
    pub replica_id: Option<String>,
}

/// Per-candidate snapshot workflow
pub struct SnapshotLifecycle<'a> {
    snapshots: &'a dyn SnapshotService,
    inventory: &'a dyn ComputeInventory,
    exporter: Option<&'a dyn MetadataExport>,
    config: &'a BackupConfig,
}

impl<'a> SnapshotLifecycle<'a> {
    pub fn new(
        snapshots: &'a dyn SnapshotService,
        inventory: &'a dyn ComputeInventory,
        exporter: Option<&'a dyn MetadataExport>,
        config: &'a BackupConfig,
    ) -> Self {
        Self {
            snapshots,
            inventory,
            exporter,
            config,
        }
    }

    /// Back up one candidate: snapshot, tag, then the enabled optional stages
    pub async fn back_up(&self, candidate: &BackupCandidate) -> Result<BackupOutcome> {
        let volume_id = candidate.volume_id.as_deref().ok_or_else(|| {
            VaultError::validation(format!(
                "candidate {} has no resolved volume",
                candidate.instance_id
            ))
        })?;

        info!(
            instance_id = %candidate.instance_id,
            volume_id = %volume_id,
            "Creating snapshot for instance"
        );

        let size_gib = if self.config.collect_storage_metrics {
            match self.inventory.volume_size_gib(volume_id).await {
                Ok(size) => size,
                Err(err) => {
                    warn!(
                        volume_id = %volume_id,
                        error = %err,
                        "Volume size lookup failed; counting zero storage"
                    );
                    0
                }
            }
        } else {
            0
        };

        let created_at = Utc::now();
        let stamp = created_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        let description = format!("Backup for {} - {}", candidate.instance_id, stamp);
        let tags = [
            (TAG_INSTANCE_ID.to_string(), candidate.instance_id.clone()),
            (TAG_BACKUP_DATE.to_string(), stamp),
        ];

        let snapshot_id = self
            .snapshots
            .create_snapshot(volume_id, &description, &tags)
            .await?;

        let replica_id = if self.config.replication_enabled() {
            let source_region = self.config.source_region.as_deref().ok_or_else(|| {
                VaultError::validation("replication requires a source region")
            })?;
            Some(
                self.snapshots
                    .copy_snapshot(&snapshot_id, source_region)
                    .await?,
            )
        } else {
            None
        };

        if let Some(exporter) = self.exporter {
            let summary = SnapshotSummary {
                snapshot_id: snapshot_id.clone(),
                instance_id: candidate.instance_id.clone(),
                created_at,
            };
            exporter.put_snapshot_summary(&summary).await?;
        }

        Ok(BackupOutcome {
            snapshot_id,
            size_gib,
            replica_id,
        })
    }
}
