/*!
Error types for the SmartVault core engine.
*/

use smartvault_retry::RetryableError;
use thiserror::Error;

/// Result type used throughout the SmartVault core.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur during a backup run.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Compute/volume inventory service errors
    #[error("Inventory error: {0}")]
    Inventory(String),

    /// Snapshot creation or enumeration errors
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Cross-region snapshot copy errors
    #[error("Replication error: {0}")]
    Replication(String),

    /// Metadata export (object storage) errors
    #[error("Export error: {0}")]
    Export(String),

    /// Metric emission errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Notification publish errors
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors during local file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VaultError {
    /// Create a new inventory error
    pub fn inventory<S: Into<String>>(msg: S) -> Self {
        Self::Inventory(msg.into())
    }

    /// Create a new snapshot error
    pub fn snapshot<S: Into<String>>(msg: S) -> Self {
        Self::Snapshot(msg.into())
    }

    /// Create a new replication error
    pub fn replication<S: Into<String>>(msg: S) -> Self {
        Self::Replication(msg.into())
    }

    /// Create a new export error
    pub fn export<S: Into<String>>(msg: S) -> Self {
        Self::Export(msg.into())
    }

    /// Create a new telemetry error
    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Self::Telemetry(msg.into())
    }

    /// Create a new notification error
    pub fn notification<S: Into<String>>(msg: S) -> Self {
        Self::Notification(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
}

impl RetryableError for VaultError {
    fn is_transient(&self) -> bool {
        match self {
            VaultError::Inventory(msg)
            | VaultError::Snapshot(msg)
            | VaultError::Replication(msg)
            | VaultError::Export(msg)
            | VaultError::Telemetry(msg)
            | VaultError::Notification(msg) => {
                msg.contains("timed out")
                    || msg.contains("dispatch")
                    || msg.contains("Throttling")
                    || msg.contains("RequestLimitExceeded")
                    || msg.contains("InternalError")
                    || msg.contains("ServiceUnavailable")
                    || msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("500")
            }
            _ => false,
        }
    }
}
