/*!
In-memory fakes for exercising the pipeline without AWS.
*/

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
    AttachedDevice, ComputeInventory, DeleteOutcome, InstanceDescription, MetadataExport,
    MetricUnit, MetricsSink, Notifier, SnapshotService,
};
use crate::model::{SnapshotRecord, SnapshotSummary, TAG_BACKUP_DATE, TAG_INSTANCE_ID};
use crate::{Result, VaultError};

pub(crate) fn instance(id: &str, devices: &[(&str, &str)]) -> InstanceDescription {
    InstanceDescription {
        instance_id: id.to_string(),
        devices: devices
            .iter()
            .map(|(name, volume)| AttachedDevice {
                device_name: name.to_string(),
                volume_id: volume.to_string(),
            })
            .collect(),
    }
}

/// Inventory returning a fixed instance set
pub(crate) struct StaticInventory {
    pub instances: Vec<InstanceDescription>,
    pub sizes: HashMap<String, i64>,
    pub fail_discovery: bool,
    pub fail_size_lookup: bool,
}

impl StaticInventory {
    pub fn new(instances: Vec<InstanceDescription>) -> Self {
        Self {
            instances,
            sizes: HashMap::new(),
            fail_discovery: false,
            fail_size_lookup: false,
        }
    }

    pub fn with_size(mut self, volume_id: &str, size: i64) -> Self {
        self.sizes.insert(volume_id.to_string(), size);
        self
    }
}

#[async_trait]
impl ComputeInventory for StaticInventory {
    async fn instances_with_tag(
        &self,
        _key: &str,
        _value: &str,
    ) -> Result<Vec<InstanceDescription>> {
        if self.fail_discovery {
            return Err(VaultError::inventory("inventory service unreachable"));
        }
        Ok(self.instances.clone())
    }

    async fn volume_size_gib(&self, volume_id: &str) -> Result<i64> {
        if self.fail_size_lookup {
            return Err(VaultError::inventory("describe_volumes request timed out"));
        }
        self.sizes
            .get(volume_id)
            .copied()
            .ok_or_else(|| VaultError::inventory(format!("volume {} not found", volume_id)))
    }
}

struct StoredSnapshot {
    id: String,
    tags: Vec<(String, String)>,
    created_at: DateTime<Utc>,
}

/// Snapshot service holding its population in memory
pub(crate) struct MemorySnapshotStore {
    stored: Mutex<Vec<StoredSnapshot>>,
    create_calls: AtomicUsize,
    next_id: AtomicUsize,
    /// 1-based create call that fails (None = never)
    pub fail_create_on_call: Option<usize>,
    pub fail_delete: HashSet<String>,
    pub fail_copy: bool,
    deleted: Mutex<Vec<String>>,
    copies: Mutex<Vec<(String, String)>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            stored: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
            fail_create_on_call: None,
            fail_delete: HashSet::new(),
            fail_copy: false,
            deleted: Mutex::new(Vec::new()),
            copies: Mutex::new(Vec::new()),
        }
    }

    /// Preload a lifecycle-tagged snapshot, as if created by a prior run
    pub fn seed(&self, id: &str, instance_id: &str, created_at: DateTime<Utc>) {
        self.stored.lock().unwrap().push(StoredSnapshot {
            id: id.to_string(),
            tags: vec![
                (TAG_INSTANCE_ID.to_string(), instance_id.to_string()),
                (
                    TAG_BACKUP_DATE.to_string(),
                    created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                ),
            ],
            created_at,
        });
    }

    pub fn stored_ids(&self) -> Vec<String> {
        self.stored.lock().unwrap().iter().map(|s| s.id.clone()).collect()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn copies(&self) -> Vec<(String, String)> {
        self.copies.lock().unwrap().clone()
    }

    pub fn tags_of(&self, id: &str) -> Option<Vec<(String, String)>> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.tags.clone())
    }
}

#[async_trait]
impl SnapshotService for MemorySnapshotStore {
    async fn create_snapshot(
        &self,
        _volume_id: &str,
        _description: &str,
        tags: &[(String, String)],
    ) -> Result<String> {
        let call = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create_on_call == Some(call) {
            return Err(VaultError::snapshot("create_snapshot service error (InternalError): boom"));
        }

        let id = format!("snap-{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let created_at = tags
            .iter()
            .find(|(key, _)| key == TAG_BACKUP_DATE)
            .and_then(|(_, value)| DateTime::parse_from_rfc3339(value).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        self.stored.lock().unwrap().push(StoredSnapshot {
            id: id.clone(),
            tags: tags.to_vec(),
            created_at,
        });
        Ok(id)
    }

    async fn snapshots_with_tag_key(&self, key: &str) -> Result<Vec<SnapshotRecord>> {
        Ok(self
            .stored
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.tags.iter().any(|(k, _)| k == key))
            .map(|s| SnapshotRecord {
                snapshot_id: s.id.clone(),
                source_instance_id: s
                    .tags
                    .iter()
                    .find(|(k, _)| k == TAG_INSTANCE_ID)
                    .map(|(_, v)| v.clone()),
                created_at: s.created_at,
                size_gib: None,
            })
            .collect())
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<DeleteOutcome> {
        if self.fail_delete.contains(snapshot_id) {
            return Err(VaultError::snapshot(
                "delete_snapshot service error (InternalError): boom",
            ));
        }

        let mut stored = self.stored.lock().unwrap();
        let before = stored.len();
        stored.retain(|s| s.id != snapshot_id);
        if stored.len() == before {
            return Ok(DeleteOutcome::AlreadyGone);
        }
        self.deleted.lock().unwrap().push(snapshot_id.to_string());
        Ok(DeleteOutcome::Deleted)
    }

    async fn copy_snapshot(&self, snapshot_id: &str, source_region: &str) -> Result<String> {
        if self.fail_copy {
            return Err(VaultError::replication(
                "copy_snapshot service error (InternalError): boom",
            ));
        }
        self.copies
            .lock()
            .unwrap()
            .push((snapshot_id.to_string(), source_region.to_string()));
        Ok(format!("{}-replica", snapshot_id))
    }
}

/// Exporter recording every summary it receives
pub(crate) struct RecordingExporter {
    pub fail: bool,
    summaries: Mutex<Vec<SnapshotSummary>>,
}

impl RecordingExporter {
    pub fn new() -> Self {
        Self {
            fail: false,
            summaries: Mutex::new(Vec::new()),
        }
    }

    pub fn exported(&self) -> Vec<SnapshotSummary> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataExport for RecordingExporter {
    async fn put_snapshot_summary(&self, summary: &SnapshotSummary) -> Result<()> {
        if self.fail {
            return Err(VaultError::export("Access denied to S3"));
        }
        self.summaries.lock().unwrap().push(summary.clone());
        Ok(())
    }
}

/// Metrics sink recording emitted data points
pub(crate) struct RecordingMetrics {
    pub fail: bool,
    emitted: Mutex<Vec<(String, MetricUnit, f64)>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self {
            fail: false,
            emitted: Mutex::new(Vec::new()),
        }
    }

    pub fn emitted(&self) -> Vec<(String, MetricUnit, f64)> {
        self.emitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSink for RecordingMetrics {
    async fn put_metric(&self, name: &str, unit: MetricUnit, value: f64) -> Result<()> {
        if self.fail {
            return Err(VaultError::telemetry("put_metric_data request timed out"));
        }
        self.emitted
            .lock()
            .unwrap()
            .push((name.to_string(), unit, value));
        Ok(())
    }
}

/// Notifier recording published messages
pub(crate) struct RecordingNotifier {
    pub fail: bool,
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            fail: false,
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, subject: &str, message: &str) -> Result<()> {
        if self.fail {
            return Err(VaultError::notification("publish request timed out"));
        }
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}
