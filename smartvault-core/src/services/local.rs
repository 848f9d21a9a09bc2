/*!
Local filesystem metadata export adapter.

Writes summary objects under a base directory using the same
`snapshots/{snapshotId}.json` keys as the S3 adapter. Intended for
development and tests; parent directories are created as needed.
*/

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::MetadataExport;
use crate::model::SnapshotSummary;
use crate::{Result, VaultError};

/// Filesystem-backed metadata export
#[derive(Debug, Clone)]
pub struct LocalMetadataExport {
    base_dir: PathBuf,
}

impl LocalMetadataExport {
    /// Create an export adapter rooted at the given directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    VaultError::export(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataExport for LocalMetadataExport {
    async fn put_snapshot_summary(&self, summary: &SnapshotSummary) -> Result<()> {
        let full_path = self.base_dir.join(summary.object_key());
        self.ensure_parent_dir(&full_path)?;

        let body = serde_json::to_vec(summary)?;
        fs::write(&full_path, body).map_err(|e| {
            VaultError::export(format!(
                "Failed to write summary to {}: {}",
                full_path.display(),
                e
            ))
        })?;

        debug!(path = %full_path.display(), "Snapshot metadata exported");
        Ok(())
    }
}
