//! Core record types: tasks, tags, and task-tag links.
//!
//! All entities are created through constructors that stamp
//! `created_at = updated_at = now`; every mutation restamps `updated_at`.
//! `completed_at` is set exactly when a task transitions into `Completed`
//! and cleared exactly when it transitions out.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a prefixed, globally unique record id (`task-<uuid>` etc.).
pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

/// Task progress state. The ordering is meaningful: the numeric code is
/// what gets persisted, and the digest checkbox mark maps 1:1 onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Numeric code used in the durable CSV files.
    pub fn code(self) -> u8 {
        match self {
            TaskStatus::NotStarted => 1,
            TaskStatus::InProgress => 2,
            TaskStatus::Completed => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TaskStatus::NotStarted),
            2 => Some(TaskStatus::InProgress),
            3 => Some(TaskStatus::Completed),
            _ => None,
        }
    }

    /// Checkbox token rendered into the daily digest.
    pub fn mark(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "[ ]",
            TaskStatus::InProgress => "[/]",
            TaskStatus::Completed => "[x]",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not-started" | "todo" => Some(TaskStatus::NotStarted),
            "in-progress" | "doing" => Some(TaskStatus::InProgress),
            "completed" | "done" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A task record. Both the in-memory and the durable copy use this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    /// Free-text note reference; may be wiki-link-bracketed.
    pub linked_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        title: impl Into<String>,
        due_date: Option<NaiveDate>,
        linked_note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id("task"),
            title: title.into(),
            status: TaskStatus::NotStarted,
            due_date,
            linked_note,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Change the status, restamping `updated_at` and maintaining the
    /// `completed_at` lifecycle on transitions into and out of `Completed`.
    pub fn apply_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if status == TaskStatus::Completed && self.status != TaskStatus::Completed {
            self.completed_at = Some(now);
        } else if status != TaskStatus::Completed && self.status == TaskStatus::Completed {
            self.completed_at = None;
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Apply a partial update, restamping `updated_at`.
    pub fn apply_update(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(due) = patch.due_date {
            self.due_date = due;
        }
        if let Some(note) = patch.linked_note {
            self.linked_note = note;
        }
        if let Some(status) = patch.status {
            self.apply_status(status, now);
            return; // apply_status already restamped
        }
        self.updated_at = now;
    }
}

/// Partial task update. `None` leaves the field unchanged; the inner
/// `Option` on `due_date`/`linked_note` allows clearing them.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<NaiveDate>>,
    pub linked_note: Option<Option<String>>,
}

/// A display tag. Names are case-insensitively unique across the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id("tag"),
            name: name.into(),
            color: random_color(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Arbitrary `#rrggbb` display color for newly minted tags.
pub fn random_color() -> String {
    let bytes = Uuid::new_v4();
    let b = bytes.as_bytes();
    format!("#{:02x}{:02x}{:02x}", b[0], b[1], b[2])
}

/// Normalized form used for case-insensitive tag name comparison.
pub fn normalize_tag_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Find a tag by case-insensitive name match.
pub fn find_tag_by_name<'a>(tags: &'a [Tag], name: &str) -> Option<&'a Tag> {
    let normalized = normalize_tag_name(name);
    tags.iter().find(|t| normalize_tag_name(&t.name) == normalized)
}

/// Return the existing tag whose name matches case-insensitively, or mint
/// a new one. Deduplication happens here, before a new id is ever created,
/// so independently-created tags with the same display name converge.
pub fn get_or_create_tag(tags: &mut Vec<Tag>, name: &str, now: DateTime<Utc>) -> Tag {
    if let Some(existing) = find_tag_by_name(tags, name) {
        return existing.clone();
    }
    let tag = Tag::new(name.trim(), now);
    tags.push(tag.clone());
    tag
}

/// A task-tag link row. Immutable once created; only presence changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTag {
    pub id: String,
    pub task_id: String,
    pub tag_id: String,
    pub created_at: DateTime<Utc>,
}

impl TaskTag {
    pub fn new(task_id: impl Into<String>, tag_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id("tasktag"),
            task_id: task_id.into(),
            tag_id: tag_id.into(),
            created_at: now,
        }
    }
}

/// Associate a tag with a task. Duplicate (task, tag) pairs are no-ops and
/// return `None`.
pub fn add_link(
    links: &mut Vec<TaskTag>,
    task_id: &str,
    tag_id: &str,
    now: DateTime<Utc>,
) -> Option<TaskTag> {
    if links
        .iter()
        .any(|l| l.task_id == task_id && l.tag_id == tag_id)
    {
        return None;
    }
    let link = TaskTag::new(task_id, tag_id, now);
    links.push(link.clone());
    Some(link)
}

/// Remove the link between a task and a tag, if present.
pub fn remove_link(links: &mut Vec<TaskTag>, task_id: &str, tag_id: &str) {
    links.retain(|l| !(l.task_id == task_id && l.tag_id == tag_id));
}

/// Delete a tag and cascade to every link row referencing it. Link rows
/// for other tags are untouched.
pub fn delete_tag(tags: &mut Vec<Tag>, links: &mut Vec<TaskTag>, tag_id: &str) {
    tags.retain(|t| t.id != tag_id);
    links.retain(|l| l.tag_id != tag_id);
}

/// Tag ids linked to a task.
pub fn tag_ids_for_task(task_id: &str, links: &[TaskTag]) -> Vec<String> {
    links
        .iter()
        .filter(|l| l.task_id == task_id)
        .map(|l| l.tag_id.clone())
        .collect()
}

/// Resolve the tags linked to a task. Links whose tag no longer exists
/// (orphans from an out-of-band delete) are silently skipped.
pub fn tags_for_task<'a>(task_id: &str, links: &[TaskTag], tags: &'a [Tag]) -> Vec<&'a Tag> {
    tag_ids_for_task(task_id, links)
        .iter()
        .filter_map(|id| tags.iter().find(|t| &t.id == id))
        .collect()
}

/// Task ids linked to a tag.
pub fn task_ids_for_tag(tag_id: &str, links: &[TaskTag]) -> Vec<String> {
    links
        .iter()
        .filter(|l| l.tag_id == tag_id)
        .map(|l| l.task_id.clone())
        .collect()
}

/// Tasks that are not yet completed.
pub fn open_tasks(tasks: &[Task]) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Completed)
        .collect()
}

/// Tasks due on the given calendar date.
pub fn tasks_due_on(tasks: &[Task], date: NaiveDate) -> Vec<&Task> {
    tasks.iter().filter(|t| t.due_date == Some(date)).collect()
}
