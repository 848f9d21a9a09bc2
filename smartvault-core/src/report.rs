/*!
Run reporting: metrics and notifications.

A successful run with at least one snapshot emits the snapshot-count and
storage metrics and publishes a completion notice; a run that created
nothing is not reported at all. The failure branch emits a single failure
metric and publishes the error text. Reporting errors are logged and
swallowed on both branches so they never mask the run's own outcome, and
they are never retried.
*/

use tracing::{debug, warn};

use crate::model::RunResult;
use crate::services::{MetricUnit, MetricsSink, Notifier};
use crate::VaultError;

pub const METRIC_TOTAL_SNAPSHOTS: &str = "TotalSnapshots";
pub const METRIC_TOTAL_STORAGE: &str = "TotalStorageUsed";
pub const METRIC_BACKUP_FAILURES: &str = "BackupFailures";

pub const SUBJECT_SUCCESS: &str = "EBS Backup Completed";
pub const SUBJECT_FAILURE: &str = "EBS Backup Failed";

/// Emits run statistics to the metrics backend and the notification bus
pub struct Reporter<'a> {
    metrics: &'a dyn MetricsSink,
    notifier: &'a dyn Notifier,
}

impl<'a> Reporter<'a> {
    pub fn new(metrics: &'a dyn MetricsSink, notifier: &'a dyn Notifier) -> Self {
        Self { metrics, notifier }
    }

    /// Report a completed run; a run with nothing to back up stays silent
    pub async fn report_success(&self, result: &RunResult) {
        let count = result.snapshot_count();
        if count == 0 {
            debug!("No snapshots created; skipping success report");
            return;
        }

        if let Err(err) = self
            .metrics
            .put_metric(METRIC_TOTAL_SNAPSHOTS, MetricUnit::Count, count as f64)
            .await
        {
            warn!(error = %err, "Failed to emit snapshot count metric");
        }
        if let Err(err) = self
            .metrics
            .put_metric(
                METRIC_TOTAL_STORAGE,
                MetricUnit::Gigabytes,
                result.total_storage_gib as f64,
            )
            .await
        {
            warn!(error = %err, "Failed to emit storage metric");
        }

        let message = format!("Successfully created {} snapshots.", count);
        if let Err(err) = self.notifier.publish(SUBJECT_SUCCESS, &message).await {
            warn!(error = %err, "Failed to publish success notification");
        }
    }

    /// Report a failed run with the error that aborted it
    pub async fn report_failure(&self, error: &VaultError) {
        if let Err(err) = self
            .metrics
            .put_metric(METRIC_BACKUP_FAILURES, MetricUnit::Count, 1.0)
            .await
        {
            warn!(error = %err, "Failed to emit failure metric");
        }

        let message = format!("Error: {}", error);
        if let Err(err) = self.notifier.publish(SUBJECT_FAILURE, &message).await {
            warn!(error = %err, "Failed to publish failure notification");
        }
    }
}
