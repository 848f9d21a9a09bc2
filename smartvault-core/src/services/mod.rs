/*!
Capability interfaces for the backup pipeline and their service adapters.

This module defines the ports the orchestration core calls (inventory,
snapshots, export, metrics, notification) and hosts the concrete AWS adapters
following hexagonal architecture principles. The core never touches a service
client directly; dependencies are passed into the run controller at
invocation time, so tests substitute fakes without shared process state.
*/

use async_trait::async_trait;
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};

use crate::model::{SnapshotRecord, SnapshotSummary};
use crate::Result;

pub mod cloudwatch;
pub mod ec2;
pub mod local;
pub mod s3;
pub mod sns;

#[cfg(test)]
pub(crate) mod fakes;

pub use cloudwatch::{CloudWatchMetrics, METRIC_NAMESPACE};
pub use ec2::{Ec2Inventory, Ec2SnapshotStore};
pub use local::LocalMetadataExport;
pub use s3::S3MetadataExport;
pub use sns::SnsNotifier;

/// An instance matching the eligibility marker, with its attached devices in
/// block-device-mapping order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub devices: Vec<AttachedDevice>,
}

/// One block device attached to an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedDevice {
    pub device_name: String,
    pub volume_id: String,
}

/// Result of an idempotent snapshot deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The snapshot no longer exists; treated as success so overlapping
    /// invocations can prune the same near-threshold snapshot
    AlreadyGone,
}

/// Unit attached to an emitted metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
    Gigabytes,
}

/// Compute/volume inventory service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComputeInventory: Send + Sync {
    /// All instances carrying the given tag key/value pair, however many
    /// matches exist
    async fn instances_with_tag(&self, key: &str, value: &str)
        -> Result<Vec<InstanceDescription>>;

    /// Provisioned size of a volume, in GiB
    async fn volume_size_gib(&self, volume_id: &str) -> Result<i64>;
}

/// Block-storage snapshot service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotService: Send + Sync {
    /// Create a snapshot of the volume with the given tags, returning its id
    async fn create_snapshot(
        &self,
        volume_id: &str,
        description: &str,
        tags: &[(String, String)],
    ) -> Result<String>;

    /// All snapshots carrying the given tag key, whichever run created them
    async fn snapshots_with_tag_key(&self, key: &str) -> Result<Vec<SnapshotRecord>>;

    /// Delete a snapshot; a snapshot that is already gone is not an error
    async fn delete_snapshot(&self, snapshot_id: &str) -> Result<DeleteOutcome>;

    /// Copy a snapshot into the adapter's destination region, returning the
    /// replica snapshot id
    async fn copy_snapshot(&self, snapshot_id: &str, source_region: &str) -> Result<String>;
}

/// Durable object-storage destination for exported snapshot metadata
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataExport: Send + Sync {
    /// Write one summary object, keyed by snapshot id; write-once, never read
    /// back by the orchestrator
    async fn put_snapshot_summary(&self, summary: &SnapshotSummary) -> Result<()>;
}

/// Metrics backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn put_metric(&self, name: &str, unit: MetricUnit, value: f64) -> Result<()>;
}

/// Notification bus
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<()>;
}

/// Render an AWS SDK error with operation and service-code context
///
/// The service code is kept in the message so transient-error classification
/// can recognize throttling and availability failures downstream.
pub(crate) fn sdk_error_message<E>(op: &str, error: &SdkError<E>) -> String
where
    E: ProvideErrorMetadata + std::fmt::Debug,
{
    match error {
        SdkError::DispatchFailure(dispatch_err) => {
            format!("{} request failed to dispatch: {:?}", op, dispatch_err)
        }
        SdkError::TimeoutError(_) => {
            format!("{} request timed out", op)
        }
        SdkError::ResponseError(response_err) => {
            format!("{} response error: {:?}", op, response_err)
        }
        SdkError::ServiceError(service_err) => match service_err.err().code() {
            Some(code) => format!(
                "{} service error ({}): {}",
                op,
                code,
                service_err.err().message().unwrap_or("Unknown error")
            ),
            None => format!("{} service error: {:?}", op, service_err.err()),
        },
        _ => format!("{} error: {}", op, error),
    }
}
