/*!
EC2 adapters for instance inventory and EBS snapshot lifecycle.

Both adapters use the official AWS SDK and the standard credential provider
chain. Enumeration paginates, so runs behave the same with one matching
instance or hundreds.
*/

use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{Filter, ResourceType, Tag, TagSpecification};
use aws_sdk_ec2::Client as Ec2Client;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{
    sdk_error_message, AttachedDevice, ComputeInventory, DeleteOutcome, InstanceDescription,
    SnapshotService,
};
use crate::model::{SnapshotRecord, TAG_BACKUP_DATE, TAG_INSTANCE_ID};
use crate::{Result, VaultError};

/// Compute/volume inventory backed by the EC2 API
#[derive(Debug, Clone)]
pub struct Ec2Inventory {
    client: Ec2Client,
}

impl Ec2Inventory {
    pub fn new(client: Ec2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComputeInventory for Ec2Inventory {
    async fn instances_with_tag(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<InstanceDescription>> {
        debug!(tag_key = %key, tag_value = %value, "Describing instances by tag");

        let filter = Filter::builder()
            .name(format!("tag:{}", key))
            .values(value)
            .build();

        let mut pages = self
            .client
            .describe_instances()
            .filters(filter)
            .into_paginator()
            .send();

        let mut instances = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| VaultError::inventory(sdk_error_message("describe_instances", &e)))?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let instance_id = match instance.instance_id() {
                        Some(id) => id.to_string(),
                        None => continue,
                    };
                    let devices = instance
                        .block_device_mappings()
                        .iter()
                        .filter_map(|mapping| {
                            let device_name = mapping.device_name()?;
                            let volume_id = mapping.ebs().and_then(|ebs| ebs.volume_id())?;
                            Some(AttachedDevice {
                                device_name: device_name.to_string(),
                                volume_id: volume_id.to_string(),
                            })
                        })
                        .collect();
                    instances.push(InstanceDescription {
                        instance_id,
                        devices,
                    });
                }
            }
        }

        debug!(count = instances.len(), "Instance discovery completed");
        Ok(instances)
    }

    async fn volume_size_gib(&self, volume_id: &str) -> Result<i64> {
        let output = self
            .client
            .describe_volumes()
            .volume_ids(volume_id)
            .send()
            .await
            .map_err(|e| VaultError::inventory(sdk_error_message("describe_volumes", &e)))?;

        output
            .volumes()
            .first()
            .and_then(|volume| volume.size())
            .map(i64::from)
            .ok_or_else(|| {
                VaultError::inventory(format!("volume {} has no reported size", volume_id))
            })
    }
}

/// EBS snapshot lifecycle adapter
///
/// Holds the source-region client and, when cross-region replication is
/// configured, a second client bound to the destination region (the EC2
/// `copy_snapshot` call is issued in the destination).
#[derive(Debug, Clone)]
pub struct Ec2SnapshotStore {
    client: Ec2Client,
    replica_client: Option<Ec2Client>,
}

impl Ec2SnapshotStore {
    pub fn new(client: Ec2Client) -> Self {
        Self {
            client,
            replica_client: None,
        }
    }

    /// Attach a client bound to the replication destination region
    pub fn with_replica_client(mut self, client: Ec2Client) -> Self {
        self.replica_client = Some(client);
        self
    }
}

#[async_trait]
impl SnapshotService for Ec2SnapshotStore {
    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
        tags: &[(String, String)],
    ) -> Result<String> {
        let mut spec = TagSpecification::builder().resource_type(ResourceType::Snapshot);
        for (key, value) in tags {
            spec = spec.tags(Tag::builder().key(key).value(value).build());
        }

        let output = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .tag_specifications(spec.build())
            .send()
            .await
            .map_err(|e| VaultError::snapshot(sdk_error_message("create_snapshot", &e)))?;

        let snapshot_id = output
            .snapshot_id()
            .ok_or_else(|| VaultError::snapshot("create_snapshot returned no snapshot id"))?;

        info!(snapshot_id = %snapshot_id, volume_id = %volume_id, "Created snapshot");
        Ok(snapshot_id.to_string())
    }

    async fn snapshots_with_tag_key(&self, key: &str) -> Result<Vec<SnapshotRecord>> {
        let filter = Filter::builder().name("tag-key").values(key).build();

        let mut pages = self
            .client
            .describe_snapshots()
            .filters(filter)
            .into_paginator()
            .send();

        let mut records = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| VaultError::snapshot(sdk_error_message("describe_snapshots", &e)))?;
            for snapshot in page.snapshots() {
                match record_from_snapshot(snapshot) {
                    Some(record) => records.push(record),
                    None => {
                        warn!(
                            snapshot_id = ?snapshot.snapshot_id(),
                            "Skipping snapshot with missing or unparsable lifecycle tag"
                        );
                    }
                }
            }
        }

        debug!(count = records.len(), "Snapshot enumeration completed");
        Ok(records)
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<DeleteOutcome> {
        match self
            .client
            .delete_snapshot()
            .snapshot_id(snapshot_id)
            .send()
            .await
        {
            Ok(_) => {
                info!(snapshot_id = %snapshot_id, "Deleted snapshot");
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) => {
                if let SdkError::ServiceError(service_err) = &err {
                    if service_err.err().code() == Some("InvalidSnapshot.NotFound") {
                        debug!(snapshot_id = %snapshot_id, "Snapshot already deleted");
                        return Ok(DeleteOutcome::AlreadyGone);
                    }
                }
                Err(VaultError::snapshot(sdk_error_message(
                    "delete_snapshot",
                    &err,
                )))
            }
        }
    }

    async fn copy_snapshot(&self, snapshot_id: &str, source_region: &str) -> Result<String> {
        let client = self.replica_client.as_ref().ok_or_else(|| {
            VaultError::replication("no destination-region client configured")
        })?;

        let output = client
            .copy_snapshot()
            .source_region(source_region)
            .source_snapshot_id(snapshot_id)
            .description(format!("Replica of {}", snapshot_id))
            .send()
            .await
            .map_err(|e| VaultError::replication(sdk_error_message("copy_snapshot", &e)))?;

        let replica_id = output
            .snapshot_id()
            .ok_or_else(|| VaultError::replication("copy_snapshot returned no snapshot id"))?;

        info!(snapshot_id = %snapshot_id, replica_id = %replica_id, "Replicated snapshot");
        Ok(replica_id.to_string())
    }
}

/// Build a pruner record from a described snapshot, reading the creation
/// timestamp from the lifecycle tag
fn record_from_snapshot(snapshot: &aws_sdk_ec2::types::Snapshot) -> Option<SnapshotRecord> {
    let snapshot_id = snapshot.snapshot_id()?.to_string();
    let tags = snapshot.tags();

    let backup_date = tags
        .iter()
        .find(|tag| tag.key() == Some(TAG_BACKUP_DATE))
        .and_then(|tag| tag.value())?;
    let created_at = DateTime::parse_from_rfc3339(backup_date)
        .ok()?
        .with_timezone(&Utc);

    let source_instance_id = tags
        .iter()
        .find(|tag| tag.key() == Some(TAG_INSTANCE_ID))
        .and_then(|tag| tag.value())
        .map(String::from);

    Some(SnapshotRecord {
        snapshot_id,
        source_instance_id,
        created_at,
        size_gib: snapshot.volume_size().map(i64::from),
    })
}
