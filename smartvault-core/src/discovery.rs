/*!
Resource discovery: resolve eligible instances to backup candidates.

Finds every instance carrying the eligibility marker and resolves each to
the attached volume chosen by the configured device-selection strategy.
Instances without a matching device yield a candidate with no volume id and
are excluded from downstream processing. An inventory error aborts the whole
run; discovery itself has no side effects.
*/

use tracing::{debug, info};

use crate::config::{DeviceSelection, EligibilityMarker};
use crate::model::BackupCandidate;
use crate::services::{AttachedDevice, ComputeInventory};
use crate::Result;

/// Discover every backup candidate matching the eligibility marker
pub async fn discover_candidates(
    inventory: &dyn ComputeInventory,
    marker: &EligibilityMarker,
    selection: &DeviceSelection,
) -> Result<Vec<BackupCandidate>> {
    info!(
        tag_key = %marker.key,
        tag_value = %marker.value,
        "Finding instances eligible for backup"
    );

    let instances = inventory
        .instances_with_tag(&marker.key, &marker.value)
        .await?;

    let mut candidates = Vec::with_capacity(instances.len());
    for instance in instances {
        let volume_id = select_volume(inventory, &instance.devices, selection).await?;
        if volume_id.is_none() {
            debug!(
                instance_id = %instance.instance_id,
                "Instance has no matching attached device; skipping"
            );
        }
        candidates.push(BackupCandidate {
            instance_id: instance.instance_id,
            volume_id,
            volume_size_gib: None,
        });
    }

    info!(count = candidates.len(), "Discovery completed");
    Ok(candidates)
}

/// Apply the device-selection strategy to an instance's attachment list
///
/// Size ranking resolves volume sizes through the inventory; a lookup
/// failure here is a discovery failure, not a telemetry one.
async fn select_volume(
    inventory: &dyn ComputeInventory,
    devices: &[AttachedDevice],
    selection: &DeviceSelection,
) -> Result<Option<String>> {
    match selection {
        DeviceSelection::FirstDevice => Ok(devices.first().map(|d| d.volume_id.clone())),
        DeviceSelection::ByDeviceName(name) => Ok(devices
            .iter()
            .find(|d| d.device_name == *name)
            .map(|d| d.volume_id.clone())),
        DeviceSelection::BySizeRank(rank) => {
            let mut sized = Vec::with_capacity(devices.len());
            for device in devices {
                let size = inventory.volume_size_gib(&device.volume_id).await?;
                sized.push((size, device.volume_id.clone()));
            }
            sized.sort_by(|a, b| b.0.cmp(&a.0));
            Ok(sized.into_iter().nth(*rank).map(|(_, id)| id))
        }
    }
}
