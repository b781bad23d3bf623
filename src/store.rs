//! Record store: the three durable collections as files in the vault.
//!
//! Tasks, tags, and task-tag links live under fixed file names inside the
//! configured task folder. Despite the `.md` extension the contents are
//! the quoted-CSV format of the codec, kept as markdown so vault tooling
//! and humans can open them. Reads of absent files yield empty
//! collections; writes fully overwrite.

use crate::codec;
use crate::error::{Result, SyncError};
use crate::types::{Tag, Task, TaskTag};
use crate::vault::{DirectoryHandle, HandleCache, ensure_directory};
use std::sync::Arc;
use tracing::debug;

pub const TASKS_FILE: &str = "tasks.md";
pub const TAGS_FILE: &str = "tags.md";
pub const TASK_TAGS_FILE: &str = "tasks-tags.md";

pub struct RecordStore {
    cache: Arc<HandleCache>,
    vault_key: String,
    task_folder: String,
}

impl RecordStore {
    pub fn new(cache: Arc<HandleCache>, vault_key: impl Into<String>, task_folder: impl Into<String>) -> Self {
        Self {
            cache,
            vault_key: vault_key.into(),
            task_folder: task_folder.into(),
        }
    }

    /// Re-validated handle to the vault root.
    pub async fn vault_root(&self) -> Result<Arc<dyn DirectoryHandle>> {
        self.cache
            .resolve(&self.vault_key)
            .await
            .ok_or_else(|| SyncError::capability_missing(&self.vault_key))
    }

    /// Handle to the task folder, created on demand.
    async fn task_dir(&self) -> Result<Arc<dyn DirectoryHandle>> {
        let root = self.vault_root().await?;
        ensure_directory(&root, &self.task_folder).await
    }

    /// Read a collection file, treating absence as empty content.
    async fn read_file(&self, name: &str) -> Result<String> {
        let dir = self.task_dir().await?;
        match dir.read_text(name).await {
            Ok(content) => Ok(content),
            Err(SyncError::NotFound { path }) => {
                debug!(path = %path.display(), "collection file absent, treating as empty");
                Ok(String::new())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn read_tasks(&self) -> Result<Vec<Task>> {
        Ok(codec::tasks_from_csv(&self.read_file(TASKS_FILE).await?))
    }

    pub async fn read_tags(&self) -> Result<Vec<Tag>> {
        Ok(codec::tags_from_csv(&self.read_file(TAGS_FILE).await?))
    }

    pub async fn read_task_tags(&self) -> Result<Vec<TaskTag>> {
        Ok(codec::task_tags_from_csv(
            &self.read_file(TASK_TAGS_FILE).await?,
        ))
    }

    pub async fn write_tasks(&self, tasks: &[Task]) -> Result<()> {
        let dir = self.task_dir().await?;
        dir.write_text(TASKS_FILE, &codec::tasks_to_csv(tasks)).await
    }

    pub async fn write_tags(&self, tags: &[Tag]) -> Result<()> {
        let dir = self.task_dir().await?;
        dir.write_text(TAGS_FILE, &codec::tags_to_csv(tags)).await
    }

    pub async fn write_task_tags(&self, links: &[TaskTag]) -> Result<()> {
        let dir = self.task_dir().await?;
        dir.write_text(TASK_TAGS_FILE, &codec::task_tags_to_csv(links))
            .await
    }
}
