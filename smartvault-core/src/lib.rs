/*!
# SmartVault Core Engine

Backup orchestration core for tagged EBS volumes.

This crate implements the scheduled backup workflow: discover instances
carrying the eligibility marker, snapshot each one's selected volume with
provenance tags, optionally replicate the snapshot cross-region and export
its metadata to object storage, prune lifecycle-tagged snapshots past the
retention window, and report run statistics to CloudWatch and SNS.

## Architecture

The core follows hexagonal architecture principles:
- Orchestration logic is isolated behind narrow capability traits
  (inventory, snapshots, export, metrics, notification)
- AWS adapters are passed into the run controller at invocation time,
  so tests substitute fakes without shared process state
- One invocation is strictly sequential; overlapping invocations stay safe
  because retention is keyed on tags and deletion is idempotent

## Usage

```rust,no_run
use std::sync::Arc;
use smartvault_core::{BackupConfig, BackupRunner};
use smartvault_core::services::{CloudWatchMetrics, Ec2Inventory, Ec2SnapshotStore, SnsNotifier};

# async fn run() {
let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
    .load()
    .await;
let ec2 = aws_sdk_ec2::Client::new(&sdk_config);

let runner = BackupRunner::new(
    Arc::new(Ec2Inventory::new(ec2.clone())),
    Arc::new(Ec2SnapshotStore::new(ec2)),
    Arc::new(CloudWatchMetrics::new(aws_sdk_cloudwatch::Client::new(&sdk_config))),
    Arc::new(SnsNotifier::new(
        aws_sdk_sns::Client::new(&sdk_config),
        "arn:aws:sns:us-east-1:123456789012:backup-alerts".to_string(),
    )),
    BackupConfig::new(),
);

let response = runner.invoke().await;
assert!(response.is_success());
# }
```
*/

pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod prune;
pub mod report;
pub mod runner;
pub mod services;
pub mod snapshot;

pub use config::{BackupConfig, DeviceSelection, EligibilityMarker, DEFAULT_RETENTION_DAYS};
pub use error::{Result, VaultError};
pub use model::{
    BackupCandidate, InvocationResponse, ResponseBody, RunOutcome, RunResult, SnapshotRecord,
    SnapshotSummary, TAG_BACKUP_DATE, TAG_INSTANCE_ID,
};
pub use prune::{prune_expired, PruneReport};
pub use runner::{BackupRunner, RunState};
pub use snapshot::{BackupOutcome, SnapshotLifecycle};
