//! Conflict resolution between the in-memory and the durable record sets.
//!
//! Merging joins the two collections by id. For tasks the resolution is
//! timestamp-driven with two guards: a 60 second recency window protecting
//! in-flight local edits from stale durable reads, and stickiness of a
//! locally-recorded Completed status, which an older-but-non-complete
//! durable record can never silently revert. Tags resolve by latest
//! `updated_at` alone; link rows are only ever unioned.

use crate::types::{Tag, Task, TaskStatus, TaskTag};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// A local record whose `updated_at` is within this many seconds of "now"
/// wins its conflict outright, regardless of the durable timestamp.
pub const RECENCY_WINDOW_SECS: i64 = 60;

/// Result of merging one collection.
#[derive(Debug, Clone)]
pub struct MergeOutcome<T> {
    pub merged: Vec<T>,
    /// True when the local view must be refreshed from `merged`: the sizes
    /// differ or some locally-known record changed. The durable file is
    /// rewritten from `merged` regardless of this flag.
    pub changed: bool,
}

/// Merge the local task set against a freshly-read durable set.
///
/// Per task id: local-only and durable-only records carry over unchanged.
/// When both sides have the record, the local copy wins if it was touched
/// within the recency window or carries the strictly newer timestamp; a
/// strictly newer durable copy wins except that it cannot revert a local
/// Completed status; on equal timestamps with differing content the
/// durable fields win but local status and `completed_at` are kept.
pub fn merge_tasks(local: &[Task], durable: &[Task], now: DateTime<Utc>) -> MergeOutcome<Task> {
    let mut merged: Vec<Task> = local.to_vec();
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(local.len());
    for (i, task) in local.iter().enumerate() {
        index.insert(task.id.as_str(), i);
    }

    for durable_task in durable {
        let Some(&i) = index.get(durable_task.id.as_str()) else {
            merged.push(durable_task.clone());
            continue;
        };
        let local_task = &local[i];
        merged[i] = resolve_task(local_task, durable_task, now);
    }

    let changed = merged.len() != local.len()
        || local
            .iter()
            .zip(merged.iter())
            .any(|(l, m)| l.updated_at != m.updated_at);

    MergeOutcome { merged, changed }
}

fn resolve_task(local: &Task, durable: &Task, now: DateTime<Utc>) -> Task {
    let recently_touched =
        now.signed_duration_since(local.updated_at) < Duration::seconds(RECENCY_WINDOW_SECS);
    if recently_touched || local.updated_at > durable.updated_at {
        return local.clone();
    }

    if durable.updated_at > local.updated_at {
        // The durable copy is newer, but a Completed status already
        // recorded locally sticks unless the durable copy is itself
        // Completed.
        let use_durable_status = local.status != TaskStatus::Completed;
        let mut resolved = durable.clone();
        if !use_durable_status {
            resolved.status = local.status;
        }
        resolved.completed_at = if use_durable_status && durable.status == TaskStatus::Completed {
            durable.completed_at
        } else {
            local.completed_at
        };
        return resolved;
    }

    // Equal timestamps: identical records pass through; otherwise the
    // durable fields win with local status as the tie-break authority.
    // This can drop durable-only edits to non-status fields when the
    // records differ only there; the behavior is intentionally lossy.
    if local == durable {
        local.clone()
    } else {
        let mut resolved = durable.clone();
        resolved.status = local.status;
        resolved.completed_at = local.completed_at;
        resolved
    }
}

/// Merge tags by id: the copy with the later `updated_at` wins outright.
/// No recency window, no status handling.
pub fn merge_tags(local: &[Tag], durable: &[Tag]) -> MergeOutcome<Tag> {
    let mut merged: Vec<Tag> = local.to_vec();
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(local.len());
    for (i, tag) in local.iter().enumerate() {
        index.insert(tag.id.as_str(), i);
    }

    for durable_tag in durable {
        match index.get(durable_tag.id.as_str()) {
            None => merged.push(durable_tag.clone()),
            Some(&i) => {
                if durable_tag.updated_at > local[i].updated_at {
                    merged[i] = durable_tag.clone();
                }
            }
        }
    }

    let changed = merged.len() != local.len()
        || local
            .iter()
            .zip(merged.iter())
            .any(|(l, m)| l.updated_at != m.updated_at);

    MergeOutcome { merged, changed }
}

/// Merge link rows by union on id. Link rows are immutable once created,
/// so there is no newer-wins comparison: a durable-only row is adopted and
/// a local-only row is kept.
pub fn merge_task_tags(local: &[TaskTag], durable: &[TaskTag]) -> MergeOutcome<TaskTag> {
    let mut merged: Vec<TaskTag> = local.to_vec();
    let known: std::collections::HashSet<&str> = local.iter().map(|l| l.id.as_str()).collect();

    for durable_link in durable {
        if !known.contains(durable_link.id.as_str()) {
            merged.push(durable_link.clone());
        }
    }

    let changed = merged.len() != local.len();
    MergeOutcome { merged, changed }
}
