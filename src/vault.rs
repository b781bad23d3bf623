//! Storage capability manager.
//!
//! A vault is reachable only through an opaque, revocable capability
//! handle obtained outside this crate (by whatever picker the host
//! application uses) and cached under a string key. Handles are
//! re-validated on every resolve; a handle whose permission check fails is
//! evicted, and the caller must treat that as "re-acquire the capability",
//! not as a transient error.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Outcome of a capability re-validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    Granted,
    Denied,
}

/// An opaque handle granting scoped read-write access to one directory.
///
/// Implementations must not expose ambient filesystem privilege: every
/// operation is relative to the directory the handle was minted for, and
/// `check_access` reports whether the grant still holds.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    /// Display name of the directory (the deepest path segment).
    fn name(&self) -> String;

    /// Re-validate read-write permission. `Err` means the handle itself is
    /// structurally broken, as opposed to a clean denial.
    async fn check_access(&self) -> Result<AccessStatus>;

    /// Handle to a direct child directory, creating it when `create` is
    /// set. Idempotent when the directory already exists.
    async fn subdir(&self, name: &str, create: bool) -> Result<Arc<dyn DirectoryHandle>>;

    /// Whole-file read of a child file.
    async fn read_text(&self, file: &str) -> Result<String>;

    /// Whole-file replace of a child file. No partial or append writes.
    async fn write_text(&self, file: &str, content: &str) -> Result<()>;
}

/// Walk a slash-separated relative path below `root`, creating every
/// missing segment, and return the deepest directory. Empty segments are
/// skipped, so `"a//b/"` behaves like `"a/b"`.
pub async fn ensure_directory(
    root: &Arc<dyn DirectoryHandle>,
    path: &str,
) -> Result<Arc<dyn DirectoryHandle>> {
    let mut current = Arc::clone(root);
    for segment in path.split('/') {
        if segment.trim().is_empty() {
            continue;
        }
        current = current.subdir(segment, true).await?;
    }
    Ok(current)
}

/// Process-wide keyed cache of capability handles.
///
/// The cache is passed explicitly to its consumers rather than living in a
/// global; its lifecycle rule is "valid until re-validation fails", at
/// which point the entry is evicted and the capability must be re-acquired
/// externally.
#[derive(Default)]
pub struct HandleCache {
    handles: Mutex<HashMap<String, Arc<dyn DirectoryHandle>>>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a handle. On a clean permission denial nothing
    /// is cached and `PermissionDenied` is returned; a structurally broken
    /// handle surfaces its own error.
    pub async fn cache(&self, key: &str, handle: Arc<dyn DirectoryHandle>) -> Result<()> {
        match handle.check_access().await? {
            AccessStatus::Granted => {
                debug!(key, dir = %handle.name(), "cached vault handle");
                self.handles.lock().await.insert(key.to_string(), handle);
                Ok(())
            }
            AccessStatus::Denied => Err(SyncError::permission_denied(key)),
        }
    }

    /// Return the cached handle after re-validating it. Any validation
    /// failure evicts the entry and yields `None`; callers map `None` to
    /// `CapabilityMissing`.
    pub async fn resolve(&self, key: &str) -> Option<Arc<dyn DirectoryHandle>> {
        let handle = self.handles.lock().await.get(key).cloned()?;
        match handle.check_access().await {
            Ok(AccessStatus::Granted) => Some(handle),
            Ok(AccessStatus::Denied) => {
                warn!(key, "vault permission revoked, evicting handle");
                self.evict(key).await;
                None
            }
            Err(err) => {
                warn!(key, %err, "cached vault handle failed validation, evicting");
                self.evict(key).await;
                None
            }
        }
    }

    pub async fn evict(&self, key: &str) {
        self.handles.lock().await.remove(key);
    }
}

/// Capability handle backed by a real directory via `tokio::fs`.
///
/// The permission flag is shared by every handle derived from the same
/// root, modeling a revocable grant: flipping it off makes the whole tree
/// of handles fail re-validation, exactly like a picker-issued capability
/// being withdrawn.
pub struct LocalVault {
    path: PathBuf,
    permission: Arc<AtomicBool>,
}

impl LocalVault {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            permission: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared revocation flag. Clearing it revokes this handle and every
    /// subdirectory handle derived from it.
    pub fn permission_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.permission)
    }

    fn identity(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl DirectoryHandle for LocalVault {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.identity())
    }

    async fn check_access(&self) -> Result<AccessStatus> {
        if !self.permission.load(Ordering::Relaxed) {
            return Ok(AccessStatus::Denied);
        }
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => Ok(AccessStatus::Granted),
            // The directory vanished or turned into something else: the
            // handle no longer refers to what it was minted for.
            Ok(_) | Err(_) => Err(SyncError::invalid_handle(&self.identity())),
        }
    }

    async fn subdir(&self, name: &str, create: bool) -> Result<Arc<dyn DirectoryHandle>> {
        if !self.permission.load(Ordering::Relaxed) {
            return Err(SyncError::permission_denied(&self.identity()));
        }
        if name.contains(['/', '\\']) || name == ".." {
            return Err(SyncError::invalid_handle(&self.identity()));
        }
        let path = self.path.join(name);
        if create {
            tokio::fs::create_dir_all(&path).await?;
        } else {
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => {}
                _ => return Err(SyncError::NotFound { path }),
            }
        }
        Ok(Arc::new(LocalVault {
            path,
            permission: Arc::clone(&self.permission),
        }))
    }

    async fn read_text(&self, file: &str) -> Result<String> {
        if !self.permission.load(Ordering::Relaxed) {
            return Err(SyncError::permission_denied(&self.identity()));
        }
        let path = self.path.join(file);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SyncError::NotFound { path })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_text(&self, file: &str, content: &str) -> Result<()> {
        if !self.permission.load(Ordering::Relaxed) {
            return Err(SyncError::permission_denied(&self.identity()));
        }
        let path = self.path.join(file);
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| SyncError::WriteFailure { path, source })
    }
}
