/*!
Amazon S3 metadata export adapter.

Writes one JSON summary object per created snapshot under
`snapshots/{snapshotId}.json`. Transient S3 failures (timeouts, dispatch
errors, 5xx) are retried with exponential backoff before the export is
declared failed.
*/

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use smartvault_retry::{
    cloud_api_backoff_policy, permanent_error, transient_error, with_custom_backoff, RetryableError,
};
use tracing::{debug, error, info};

use super::{sdk_error_message, MetadataExport};
use crate::model::SnapshotSummary;
use crate::{Result, VaultError};

/// Amazon S3 metadata export adapter
///
/// Uses the standard AWS credential provider chain of the client it is
/// constructed with.
#[derive(Debug, Clone)]
pub struct S3MetadataExport {
    client: S3Client,
    bucket: String,
}

impl S3MetadataExport {
    /// Create an export adapter targeting the given bucket
    pub fn new(client: S3Client, bucket: String) -> Self {
        info!(bucket = %bucket, "Initialized S3 metadata export");
        Self { client, bucket }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl MetadataExport for S3MetadataExport {
    async fn put_snapshot_summary(&self, summary: &SnapshotSummary) -> Result<()> {
        let key = summary.object_key();
        let body = serde_json::to_vec(summary)?;

        info!(
            bucket = %self.bucket,
            key = %key,
            size = body.len(),
            "Exporting snapshot metadata"
        );

        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let object_key = key.clone();

        let result = with_custom_backoff("put_object", cloud_api_backoff_policy(), move |_attempt| {
            let client = client.clone();
            let bucket = bucket.clone();
            let key = object_key.clone();
            let body = body.clone();
            Box::pin(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(body))
                    .content_type("application/json")
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|err| {
                        let mapped = VaultError::export(sdk_error_message("put_object", &err));
                        if mapped.is_transient() {
                            transient_error!("put_object", mapped)
                        } else {
                            permanent_error!("put_object", mapped)
                        }
                    })
            })
        })
        .await;

        match result {
            Ok(()) => {
                debug!(bucket = %self.bucket, key = %key, "Snapshot metadata exported");
                Ok(())
            }
            Err(err) => {
                let mapped = match err.into_source().downcast::<VaultError>() {
                    Ok(vault_err) => *vault_err,
                    Err(other) => VaultError::export(other.to_string()),
                };
                error!(
                    bucket = %self.bucket,
                    key = %key,
                    error = %mapped,
                    "Failed to export snapshot metadata"
                );
                Err(mapped)
            }
        }
    }
}
