//! Error kinds for vault synchronization.
//!
//! Every variant maps to a distinct recovery strategy: capability errors
//! mean the vault must be re-selected by the user, `NotFound` on a read
//! path is recovered locally as an empty collection, `MalformedRecord`
//! skips the row, and `WriteFailure` aborts the sync pass without touching
//! in-memory state. Nothing here is fatal to the process.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No handle is cached under this key; the vault must be re-acquired
    /// through the external picker.
    #[error("no vault capability cached under key '{key}'; reselect the vault")]
    CapabilityMissing { key: String },

    /// A handle exists but re-validation refused read-write access.
    #[error("read-write permission denied for vault '{key}'")]
    PermissionDenied { key: String },

    /// The cached handle failed structural checks. Callers evict it and
    /// treat the condition as `CapabilityMissing`.
    #[error("cached handle for '{key}' is no longer valid")]
    InvalidHandle { key: String },

    /// An expected file or directory is absent. Read paths recover from
    /// this silently; it only surfaces for operations that require the
    /// target to exist.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },

    /// A decoded row was missing required fields. The row is skipped; the
    /// surrounding read succeeds.
    #[error("malformed record at row {row}: {reason}")]
    MalformedRecord { row: usize, reason: String },

    /// The backend rejected a write. The sync pass aborts and the caller's
    /// in-memory state is left at its pre-pass value.
    #[error("write to {path} failed: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn capability_missing(key: &str) -> Self {
        SyncError::CapabilityMissing { key: key.to_string() }
    }

    pub fn permission_denied(key: &str) -> Self {
        SyncError::PermissionDenied { key: key.to_string() }
    }

    pub fn invalid_handle(key: &str) -> Self {
        SyncError::InvalidHandle { key: key.to_string() }
    }

    /// Whether this error means the capability must be re-acquired via the
    /// external picker, as opposed to a retryable or recoverable failure.
    pub fn needs_reselection(&self) -> bool {
        matches!(
            self,
            SyncError::CapabilityMissing { .. }
                | SyncError::PermissionDenied { .. }
                | SyncError::InvalidHandle { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
