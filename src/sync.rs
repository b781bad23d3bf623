//! Synchronization passes.
//!
//! A pass reads the durable copy fresh, merges, and unconditionally
//! rewrites the durable file from the merged set. Passes over the same
//! collection are serialized by a per-collection mutex; callers trigger
//! them explicitly after mutations rather than fire-and-forget. A failed
//! pass returns an error without producing an outcome, so the caller's
//! in-memory state stays at its pre-pass value.

use crate::config::Config;
use crate::daily;
use crate::error::Result;
use crate::links::{note_name, sanitize_file_name};
use crate::merge::{MergeOutcome, merge_task_tags, merge_tags, merge_tasks};
use crate::store::RecordStore;
use crate::types::{Tag, Task, TaskStatus, TaskTag, open_tasks, tasks_due_on};
use chrono::{Local, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct Synchronizer {
    store: RecordStore,
    config: Config,
    /// Set for a session's first task pass: the durable copy is
    /// authoritative for bootstrapping against an existing vault.
    first_sync: AtomicBool,
    task_pass: Mutex<()>,
    tag_pass: Mutex<()>,
}

impl Synchronizer {
    pub fn new(store: RecordStore, config: Config, first_sync: bool) -> Self {
        Self {
            store,
            config,
            first_sync: AtomicBool::new(first_sync),
            task_pass: Mutex::new(()),
            tag_pass: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Run one task synchronization pass against the vault.
    ///
    /// On the session's first pass a non-empty durable set replaces the
    /// local one wholesale; an empty durable set is seeded from local.
    /// Subsequent passes merge. The merged set is always written back.
    pub async fn sync_tasks(&self, local: &[Task]) -> Result<MergeOutcome<Task>> {
        let _pass = self.task_pass.lock().await;

        let durable = self.store.read_tasks().await?;
        debug!(local = local.len(), durable = durable.len(), "task sync pass");

        let outcome = if self.first_sync.load(Ordering::Acquire) {
            let merged = if durable.is_empty() {
                local.to_vec()
            } else {
                durable
            };
            MergeOutcome { merged, changed: true }
        } else {
            merge_tasks(local, &durable, Utc::now())
        };

        self.store.write_tasks(&outcome.merged).await?;
        self.first_sync.store(false, Ordering::Release);
        info!(
            merged = outcome.merged.len(),
            changed = outcome.changed,
            "task sync pass complete"
        );
        Ok(outcome)
    }

    /// Run one tag-and-links synchronization pass. Tags merge by latest
    /// `updated_at`; link rows are unioned.
    pub async fn sync_tags(
        &self,
        local_tags: &[Tag],
        local_links: &[TaskTag],
    ) -> Result<(MergeOutcome<Tag>, MergeOutcome<TaskTag>)> {
        let _pass = self.tag_pass.lock().await;

        let durable_tags = self.store.read_tags().await?;
        let durable_links = self.store.read_task_tags().await?;

        let tags = merge_tags(local_tags, &durable_tags);
        let links = merge_task_tags(local_links, &durable_links);

        self.store.write_tags(&tags.merged).await?;
        self.store.write_task_tags(&links.merged).await?;
        info!(
            tags = tags.merged.len(),
            links = links.merged.len(),
            "tag sync pass complete"
        );
        Ok((tags, links))
    }

    /// Regenerate today's digest from the given task set. Respects the
    /// enablement flag and the all-tasks vs due-today selection.
    pub async fn update_daily_note(&self, tasks: &[Task]) -> Result<()> {
        if !self.config.daily_note_enabled {
            debug!("daily note disabled, skipping update");
            return Ok(());
        }
        let today = Local::now().date_naive();
        let selected: Vec<&Task> = if self.config.daily_note_all_tasks {
            open_tasks(tasks)
        } else {
            tasks_due_on(tasks, today)
                .into_iter()
                .filter(|t| t.status != TaskStatus::Completed)
                .collect()
        };
        let root = self.store.vault_root().await?;
        daily::update_daily_note(&root, &self.config, &selected, today).await
    }

    /// Read today's digest and propose task updates from hand-edited
    /// checkboxes.
    pub async fn detect_daily_note_changes(&self, tasks: &[Task]) -> Result<Vec<Task>> {
        if !self.config.daily_note_enabled {
            return Ok(Vec::new());
        }
        let today = Local::now().date_naive();
        let root = self.store.vault_root().await?;
        daily::detect_daily_note_changes(&root, &self.config, tasks, today, Utc::now()).await
    }

    /// Make sure the note referenced by a task's link exists in the note
    /// folder, creating a stub with a title heading when it does not.
    pub async fn ensure_linked_note(&self, link_text: &str) -> Result<()> {
        let name = sanitize_file_name(note_name(link_text));
        if name.is_empty() {
            return Ok(());
        }
        let root = self.store.vault_root().await?;
        let dir = crate::vault::ensure_directory(&root, &self.config.note_folder).await?;
        let file = format!("{}.md", name);
        match dir.read_text(&file).await {
            Ok(_) => Ok(()),
            Err(crate::error::SyncError::NotFound { .. }) => {
                dir.write_text(&file, &format!("# {}\n", name)).await
            }
            Err(err) => Err(err),
        }
    }
}
