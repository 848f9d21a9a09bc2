//! Configuration for a backup run
//!
//! This module provides the knobs the run controller reads: the eligibility
//! marker that selects instances, the device-selection strategy, the retention
//! window, and the flags controlling the optional stages (size lookup,
//! cross-region replication, per-candidate failure isolation). Metadata export
//! is enabled by constructing the runner with an exporter; everything else is
//! plain runtime configuration, never a build feature.

use serde::{Deserialize, Serialize};

/// Default retention window, in days, before a tagged snapshot is pruned.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Tag condition used to select which compute instances participate in backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityMarker {
    pub key: String,
    pub value: String,
}

impl Default for EligibilityMarker {
    fn default() -> Self {
        EligibilityMarker {
            key: "Backup".to_string(),
            value: "True".to_string(),
        }
    }
}

/// Strategy for resolving which attached block device backs an instance's
/// backup candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSelection {
    /// The first device in the instance's block device mapping order
    FirstDevice,
    /// The device whose name matches exactly (e.g. `/dev/xvda`)
    ByDeviceName(String),
    /// The device ranked `n` by volume size, largest first (0 = largest)
    BySizeRank(usize),
}

impl Default for DeviceSelection {
    fn default() -> Self {
        DeviceSelection::FirstDevice
    }
}

/// Configuration for one backup invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Tag key/value pair selecting eligible instances
    pub eligibility: EligibilityMarker,
    /// How to pick the backed-up device among an instance's attachments
    pub device_selection: DeviceSelection,
    /// Maximum age, in days, a tagged snapshot may reach before deletion
    pub retention_days: u32,
    /// Look up volume sizes so storage telemetry can be emitted
    pub collect_storage_metrics: bool,
    /// Continue past a failed candidate instead of aborting the run
    pub isolate_snapshot_failures: bool,
    /// Region snapshots are created in (required when replication is enabled)
    pub source_region: Option<String>,
    /// Destination region for cross-region replication (None disables it)
    pub replica_region: Option<String>,
}

impl BackupConfig {
    /// Create a configuration with the stock marker, strategy, and retention
    pub fn new() -> Self {
        BackupConfig {
            eligibility: EligibilityMarker::default(),
            device_selection: DeviceSelection::default(),
            retention_days: DEFAULT_RETENTION_DAYS,
            collect_storage_metrics: true,
            isolate_snapshot_failures: false,
            source_region: None,
            replica_region: None,
        }
    }

    /// Set the retention window
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Set the device-selection strategy
    pub fn with_device_selection(mut self, selection: DeviceSelection) -> Self {
        self.device_selection = selection;
        self
    }

    /// Enable cross-region replication into the given destination region
    pub fn with_replication<S1, S2>(mut self, source_region: S1, replica_region: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.source_region = Some(source_region.into());
        self.replica_region = Some(replica_region.into());
        self
    }

    /// Whether the replication stage is active
    pub fn replication_enabled(&self) -> bool {
        self.replica_region.is_some()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.eligibility.key.is_empty() {
            return Err(crate::VaultError::validation(
                "eligibility marker requires a tag key",
            ));
        }
        if self.replica_region.is_some() && self.source_region.is_none() {
            return Err(crate::VaultError::validation(
                "replication requires a source region",
            ));
        }
        if let DeviceSelection::ByDeviceName(name) = &self.device_selection {
            if name.is_empty() {
                return Err(crate::VaultError::validation(
                    "device name selection requires a non-empty name",
                ));
            }
        }
        Ok(())
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self::new()
    }
}
