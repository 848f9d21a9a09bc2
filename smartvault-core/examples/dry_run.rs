/*!
Dry-run example: one full backup invocation against simulated services.

Runs the whole discovery → snapshot → prune → report sequence without
touching AWS, printing every notification and the scheduler-facing response.
*/

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use smartvault_core::services::{
    AttachedDevice, ComputeInventory, DeleteOutcome, InstanceDescription, LocalMetadataExport,
    MetricUnit, MetricsSink, Notifier, SnapshotService,
};
use smartvault_core::{
    BackupConfig, BackupRunner, Result, SnapshotRecord, VaultError, TAG_BACKUP_DATE,
    TAG_INSTANCE_ID,
};

/// Three tagged instances, one of them with no attached storage
struct SimulatedFleet;

#[async_trait]
impl ComputeInventory for SimulatedFleet {
    async fn instances_with_tag(
        &self,
        _key: &str,
        _value: &str,
    ) -> Result<Vec<InstanceDescription>> {
        let device = |name: &str, volume: &str| AttachedDevice {
            device_name: name.to_string(),
            volume_id: volume.to_string(),
        };
        Ok(vec![
            InstanceDescription {
                instance_id: "i-0aa11bb22cc33dd44".to_string(),
                devices: vec![device("/dev/xvda", "vol-web")],
            },
            InstanceDescription {
                instance_id: "i-0ee55ff66aa77bb88".to_string(),
                devices: vec![device("/dev/xvda", "vol-db"), device("/dev/sdf", "vol-logs")],
            },
            InstanceDescription {
                instance_id: "i-0cc99dd00ee11ff22".to_string(),
                devices: vec![],
            },
        ])
    }

    async fn volume_size_gib(&self, volume_id: &str) -> Result<i64> {
        match volume_id {
            "vol-web" => Ok(8),
            "vol-db" => Ok(200),
            "vol-logs" => Ok(50),
            other => Err(VaultError::inventory(format!("volume {} not found", other))),
        }
    }
}

struct SimulatedSnapshots {
    stored: Mutex<Vec<(String, Vec<(String, String)>, DateTime<Utc>)>>,
    next_id: AtomicUsize,
}

impl SimulatedSnapshots {
    fn new() -> Self {
        let store = Self {
            stored: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
        };
        // One snapshot left over from three weeks ago, due for pruning.
        store.stored.lock().unwrap().push((
            "snap-stale".to_string(),
            vec![
                (TAG_INSTANCE_ID.to_string(), "i-retired".to_string()),
                (
                    TAG_BACKUP_DATE.to_string(),
                    (Utc::now() - Duration::days(21))
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
            ],
            Utc::now() - Duration::days(21),
        ));
        store
    }
}

#[async_trait]
impl SnapshotService for SimulatedSnapshots {
    async fn create_snapshot(
        &self,
        volume_id: &str,
        _description: &str,
        tags: &[(String, String)],
    ) -> Result<String> {
        let id = format!("snap-{:08x}", self.next_id.fetch_add(1, Ordering::SeqCst));
        println!("  created {} from {}", id, volume_id);
        self.stored
            .lock()
            .unwrap()
            .push((id.clone(), tags.to_vec(), Utc::now()));
        Ok(id)
    }

    async fn snapshots_with_tag_key(&self, key: &str) -> Result<Vec<SnapshotRecord>> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tags, _)| tags.iter().any(|(k, _)| k == key))
            .map(|(id, tags, created_at)| SnapshotRecord {
                snapshot_id: id.clone(),
                source_instance_id: tags
                    .iter()
                    .find(|(k, _)| k == TAG_INSTANCE_ID)
                    .map(|(_, v)| v.clone()),
                created_at: *created_at,
                size_gib: None,
            })
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<DeleteOutcome> {
        let mut stored = self.stored.lock().unwrap();
        let before = stored.len();
        stored.retain(|(id, _, _)| id != snapshot_id);
        if stored.len() == before {
            return Ok(DeleteOutcome::AlreadyGone);
        }
        println!("  pruned {}", snapshot_id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn copy_snapshot(&self, snapshot_id: &str, _source_region: &str) -> Result<String> {
        Ok(format!("{}-replica", snapshot_id))
    }
}

struct StdoutMetrics;

#[async_trait]
impl MetricsSink for StdoutMetrics {
    async fn put_metric(&self, name: &str, unit: MetricUnit, value: f64) -> Result<()> {
        println!("  metric {} = {} ({:?})", name, value, unit);
        Ok(())
    }
}

struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        println!("  notification [{}] {}", subject, message);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let export_dir = tempfile::TempDir::new().unwrap();

    let runner = BackupRunner::new(
        Arc::new(SimulatedFleet),
        Arc::new(SimulatedSnapshots::new()),
        Arc::new(StdoutMetrics),
        Arc::new(StdoutNotifier),
        BackupConfig::new().with_retention_days(14),
    )
    .with_exporter(Arc::new(LocalMetadataExport::new(export_dir.path())));

    println!("Running backup invocation:");
    let response = runner.invoke().await;

    println!("\nScheduler response:");
    println!("{}", serde_json::to_string_pretty(&response).unwrap());

    println!("\nExported metadata objects:");
    for entry in std::fs::read_dir(export_dir.path().join("snapshots")).unwrap() {
        let entry = entry.unwrap();
        println!(
            "  {} ({} bytes)",
            entry.file_name().to_string_lossy(),
            entry.metadata().unwrap().len()
        );
    }
}
