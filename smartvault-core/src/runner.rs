/*!
Run controller: sequences one backup invocation.

States progress `Idle → Discovering → SnapshotCreation → Pruning → Reporting
→ Done`, with an edge from any state to `Failed` on unhandled error, at which
point control jumps straight to the failure branch of reporting and then
`Done`. The terminal status is binary: a failure after discovery abandons the
remainder of the pipeline, and snapshots already created stay in existence.
There is no retry state and no mutual exclusion between overlapping
invocations; retention stays safe across overlap because it is keyed on tags
and deletion is idempotent.
*/

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::BackupConfig;
use crate::discovery::discover_candidates;
use crate::model::{InvocationResponse, RunOutcome, RunResult};
use crate::prune::prune_expired;
use crate::report::Reporter;
use crate::services::{ComputeInventory, MetadataExport, MetricsSink, Notifier, SnapshotService};
use crate::snapshot::SnapshotLifecycle;
use crate::Result;

/// Phases of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Discovering,
    SnapshotCreation,
    Pruning,
    Reporting,
    Done,
    Failed,
}

struct StateTracker {
    state: RunState,
}

impl StateTracker {
    fn new() -> Self {
        Self {
            state: RunState::Idle,
        }
    }

    fn enter(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "Run state transition");
        self.state = next;
    }
}

#[derive(Default)]
struct RunStats {
    created_snapshot_ids: Vec<String>,
    total_storage_gib: i64,
    failure_count: u32,
}

impl RunStats {
    fn into_result(self, outcome: RunOutcome) -> RunResult {
        RunResult {
            created_snapshot_ids: self.created_snapshot_ids,
            total_storage_gib: self.total_storage_gib,
            failure_count: self.failure_count,
            outcome,
        }
    }
}

/// Orchestrates discovery → snapshot → prune → report for one invocation
///
/// Dependencies are passed in at construction; the runner holds no state
/// across invocations beyond what its collaborators persist themselves.
pub struct BackupRunner {
    inventory: Arc<dyn ComputeInventory>,
    snapshots: Arc<dyn SnapshotService>,
    exporter: Option<Arc<dyn MetadataExport>>,
    metrics: Arc<dyn MetricsSink>,
    notifier: Arc<dyn Notifier>,
    config: BackupConfig,
}

impl BackupRunner {
    pub fn new(
        inventory: Arc<dyn ComputeInventory>,
        snapshots: Arc<dyn SnapshotService>,
        metrics: Arc<dyn MetricsSink>,
        notifier: Arc<dyn Notifier>,
        config: BackupConfig,
    ) -> Self {
        Self {
            inventory,
            snapshots,
            exporter: None,
            metrics,
            notifier,
            config,
        }
    }

    /// Enable metadata export through the given destination
    pub fn with_exporter(mut self, exporter: Arc<dyn MetadataExport>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Execute one full invocation and shape the scheduler-facing response
    pub async fn invoke(&self) -> InvocationResponse {
        let mut state = StateTracker::new();
        let mut stats = RunStats::default();
        let reporter = Reporter::new(self.metrics.as_ref(), self.notifier.as_ref());

        match self.execute(&mut state, &mut stats).await {
            Ok(()) => {
                state.enter(RunState::Reporting);
                let result = stats.into_result(RunOutcome::Success);
                reporter.report_success(&result).await;
                state.enter(RunState::Done);
                info!(
                    snapshots = result.snapshot_count(),
                    storage_gib = result.total_storage_gib,
                    tolerated_failures = result.failure_count,
                    "Backup completed"
                );
                InvocationResponse::success("Backup Completed")
            }
            Err(err) => {
                state.enter(RunState::Failed);
                let result = stats.into_result(RunOutcome::Failure);
                error!(
                    error = %err,
                    created = result.snapshot_count(),
                    "Backup failed; abandoning remainder of run"
                );
                state.enter(RunState::Reporting);
                reporter.report_failure(&err).await;
                state.enter(RunState::Done);
                InvocationResponse::failure(err.to_string())
            }
        }
    }

    async fn execute(&self, state: &mut StateTracker, stats: &mut RunStats) -> Result<()> {
        self.config.validate()?;

        state.enter(RunState::Discovering);
        let candidates = discover_candidates(
            self.inventory.as_ref(),
            &self.config.eligibility,
            &self.config.device_selection,
        )
        .await?;

        state.enter(RunState::SnapshotCreation);
        let lifecycle = SnapshotLifecycle::new(
            self.snapshots.as_ref(),
            self.inventory.as_ref(),
            self.exporter.as_deref(),
            &self.config,
        );
        for candidate in candidates.iter().filter(|c| c.has_volume()) {
            match lifecycle.back_up(candidate).await {
                Ok(outcome) => {
                    stats.total_storage_gib += outcome.size_gib;
                    stats.created_snapshot_ids.push(outcome.snapshot_id);
                }
                Err(err) if self.config.isolate_snapshot_failures => {
                    warn!(
                        instance_id = %candidate.instance_id,
                        error = %err,
                        "Candidate backup failed; continuing with remaining candidates"
                    );
                    stats.failure_count += 1;
                }
                Err(err) => return Err(err),
            }
        }

        state.enter(RunState::Pruning);
        let prune_report =
            prune_expired(self.snapshots.as_ref(), self.config.retention_days, Utc::now()).await?;
        stats.failure_count += prune_report.failed;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{
        METRIC_BACKUP_FAILURES, METRIC_TOTAL_SNAPSHOTS, METRIC_TOTAL_STORAGE, SUBJECT_FAILURE,
        SUBJECT_SUCCESS,
    };
    use crate::services::fakes::{
        instance, MemorySnapshotStore, RecordingExporter, RecordingMetrics, RecordingNotifier,
        StaticInventory,
    };
    use crate::services::{InstanceDescription, MetricUnit};
    use chrono::Duration;

    struct Harness {
        inventory: Arc<StaticInventory>,
        store: Arc<MemorySnapshotStore>,
        metrics: Arc<RecordingMetrics>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn new(inventory: StaticInventory, store: MemorySnapshotStore) -> Self {
            Self {
                inventory: Arc::new(inventory),
                store: Arc::new(store),
                metrics: Arc::new(RecordingMetrics::new()),
                notifier: Arc::new(RecordingNotifier::new()),
            }
        }

        fn runner(&self, config: BackupConfig) -> BackupRunner {
            BackupRunner::new(
                self.inventory.clone(),
                self.store.clone(),
                self.metrics.clone(),
                self.notifier.clone(),
                config,
            )
        }
    }

    fn one_instance() -> Vec<InstanceDescription> {
        vec![instance("i-1", &[("/dev/xvda", "vol-1")])]
    }

    #[tokio::test]
    async fn test_single_candidate_happy_path() {
        let inventory = StaticInventory::new(one_instance()).with_size("vol-1", 8);
        let harness = Harness::new(inventory, MemorySnapshotStore::new());
        let runner = harness.runner(BackupConfig::new());

        let response = runner.invoke().await;

        assert!(response.is_success());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["body"]["message"], "Backup Completed");

        assert_eq!(harness.store.stored_ids().len(), 1);

        let emitted = harness.metrics.emitted();
        assert_eq!(
            emitted,
            vec![
                (METRIC_TOTAL_SNAPSHOTS.to_string(), MetricUnit::Count, 1.0),
                (METRIC_TOTAL_STORAGE.to_string(), MetricUnit::Gigabytes, 8.0),
            ]
        );

        let published = harness.notifier.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, SUBJECT_SUCCESS);
        assert!(published[0].1.contains("Successfully created 1 snapshots."));
    }

    #[tokio::test]
    async fn test_zero_candidates_is_quiet_success() {
        let harness = Harness::new(StaticInventory::new(vec![]), MemorySnapshotStore::new());
        let runner = harness.runner(BackupConfig::new());

        let response = runner.invoke().await;

        assert!(response.is_success());
        assert!(harness.store.stored_ids().is_empty());
        assert!(harness.metrics.emitted().is_empty());
        assert!(harness.notifier.published().is_empty());
    }

    #[tokio::test]
    async fn test_volumeless_instances_are_skipped() {
        let inventory = StaticInventory::new(vec![
            instance("i-1", &[("/dev/xvda", "vol-1")]),
            instance("i-2", &[]),
        ])
        .with_size("vol-1", 20);
        let harness = Harness::new(inventory, MemorySnapshotStore::new());
        let runner = harness.runner(BackupConfig::new());

        let response = runner.invoke().await;

        assert!(response.is_success());
        assert_eq!(harness.store.stored_ids().len(), 1);
        assert!(harness.notifier.published()[0]
            .1
            .contains("Successfully created 1 snapshots."));
    }

    #[tokio::test]
    async fn test_discovery_failure_aborts_run() {
        let mut inventory = StaticInventory::new(one_instance());
        inventory.fail_discovery = true;
        let harness = Harness::new(inventory, MemorySnapshotStore::new());
        let runner = harness.runner(BackupConfig::new());

        let response = runner.invoke().await;

        assert_eq!(response.status_code, 500);
        assert!(harness.store.stored_ids().is_empty());

        let emitted = harness.metrics.emitted();
        assert_eq!(
            emitted,
            vec![(METRIC_BACKUP_FAILURES.to_string(), MetricUnit::Count, 1.0)]
        );

        let published = harness.notifier.published();
        assert_eq!(published[0].0, SUBJECT_FAILURE);
        assert!(published[0].1.contains("inventory service unreachable"));
    }

    #[tokio::test]
    async fn test_candidate_failure_aborts_remaining_candidates() {
        let inventory = StaticInventory::new(vec![
            instance("i-1", &[("/dev/xvda", "vol-1")]),
            instance("i-2", &[("/dev/xvda", "vol-2")]),
            instance("i-3", &[("/dev/xvda", "vol-3")]),
        ])
        .with_size("vol-1", 1)
        .with_size("vol-2", 1)
        .with_size("vol-3", 1);
        let mut store = MemorySnapshotStore::new();
        store.fail_create_on_call = Some(2);
        let harness = Harness::new(inventory, store);
        let runner = harness.runner(BackupConfig::new());

        let response = runner.invoke().await;

        assert_eq!(response.status_code, 500);
        // Only the candidate processed before the failure produced a snapshot.
        assert_eq!(harness.store.stored_ids().len(), 1);
        assert_eq!(harness.notifier.published()[0].0, SUBJECT_FAILURE);
    }

    #[tokio::test]
    async fn test_isolation_flag_continues_past_candidate_failure() {
        let inventory = StaticInventory::new(vec![
            instance("i-1", &[("/dev/xvda", "vol-1")]),
            instance("i-2", &[("/dev/xvda", "vol-2")]),
            instance("i-3", &[("/dev/xvda", "vol-3")]),
        ])
        .with_size("vol-1", 4)
        .with_size("vol-2", 4)
        .with_size("vol-3", 4);
        let mut store = MemorySnapshotStore::new();
        store.fail_create_on_call = Some(2);
        let harness = Harness::new(inventory, store);

        let mut config = BackupConfig::new();
        config.isolate_snapshot_failures = true;
        let runner = harness.runner(config);

        let response = runner.invoke().await;

        assert!(response.is_success());
        assert_eq!(harness.store.stored_ids().len(), 2);
        assert!(harness.notifier.published()[0]
            .1
            .contains("Successfully created 2 snapshots."));
    }

    #[tokio::test]
    async fn test_run_prunes_expired_snapshots() {
        let store = MemorySnapshotStore::new();
        store.seed("snap-ancient", "i-9", Utc::now() - Duration::days(10));
        let inventory = StaticInventory::new(one_instance()).with_size("vol-1", 8);
        let harness = Harness::new(inventory, store);
        let runner = harness.runner(BackupConfig::new());

        let response = runner.invoke().await;

        assert!(response.is_success());
        assert_eq!(harness.store.deleted_ids(), vec!["snap-ancient".to_string()]);
        // The snapshot created this run is younger than the window and stays.
        assert_eq!(harness.store.stored_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_failure_does_not_fail_run() {
        let mut store = MemorySnapshotStore::new();
        store.fail_delete.insert("snap-stuck".to_string());
        store.seed("snap-stuck", "i-9", Utc::now() - Duration::days(10));
        let inventory = StaticInventory::new(one_instance()).with_size("vol-1", 8);
        let harness = Harness::new(inventory, store);
        let runner = harness.runner(BackupConfig::new());

        let response = runner.invoke().await;

        assert!(response.is_success());
        assert_eq!(harness.notifier.published()[0].0, SUBJECT_SUCCESS);
    }

    #[tokio::test]
    async fn test_export_runs_per_snapshot() {
        let inventory = StaticInventory::new(vec![
            instance("i-1", &[("/dev/xvda", "vol-1")]),
            instance("i-2", &[("/dev/xvda", "vol-2")]),
        ])
        .with_size("vol-1", 1)
        .with_size("vol-2", 1);
        let harness = Harness::new(inventory, MemorySnapshotStore::new());
        let exporter = Arc::new(RecordingExporter::new());
        let runner = harness
            .runner(BackupConfig::new())
            .with_exporter(exporter.clone());

        let response = runner.invoke().await;

        assert!(response.is_success());
        let exported = exporter.exported();
        assert_eq!(exported.len(), 2);
        assert_eq!(exported[0].instance_id, "i-1");
        assert_eq!(exported[1].instance_id, "i-2");
    }

    #[tokio::test]
    async fn test_invalid_config_reports_failure() {
        let harness = Harness::new(StaticInventory::new(vec![]), MemorySnapshotStore::new());
        let mut config = BackupConfig::new();
        config.replica_region = Some("us-west-2".to_string());
        let runner = harness.runner(config);

        let response = runner.invoke().await;

        assert_eq!(response.status_code, 500);
        assert_eq!(harness.notifier.published()[0].0, SUBJECT_FAILURE);
    }
}
