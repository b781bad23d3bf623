//! Quoted-CSV codec for the durable record files.
//!
//! Every field is double-quoted, inner quotes are doubled, and a null
//! field encodes as `""`. The decoder is a character state machine rather
//! than a line splitter: a raw newline inside an open quote belongs to the
//! field, so `decode_rows(encode_rows(x)) == x` even for fields spanning
//! multiple raw lines.

use crate::error::{Result, SyncError};
use crate::types::{random_color, Tag, Task, TaskStatus, TaskTag};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

pub const TASKS_HEADER: [&str; 8] = [
    "id",
    "title",
    "status",
    "dueDate",
    "linkedNote",
    "createdAt",
    "updatedAt",
    "completedAt",
];
pub const TAGS_HEADER: [&str; 5] = ["id", "name", "color", "createdAt", "updatedAt"];
pub const TASK_TAGS_HEADER: [&str; 4] = ["id", "taskId", "tagId", "createdAt"];

/// Quote a single field, doubling any embedded quotes.
pub fn encode_field(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Encode one row as comma-separated quoted fields.
pub fn encode_row(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| encode_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Encode rows as newline-separated CSV text.
pub fn encode_rows(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|r| encode_row(r))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode CSV text into rows of fields. Newlines inside quoted fields are
/// consumed as field content; rows that are blank outside of quotes are
/// dropped. An unterminated quote at end of input yields the field as-is.
pub fn decode_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut row_quoted = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                row_quoted = true;
            }
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                if !row_is_blank(&row, row_quoted) {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
                row_quoted = false;
            }
            other => field.push(other),
        }
    }
    row.push(field);
    if !row_is_blank(&row, row_quoted) {
        rows.push(row);
    }
    rows
}

/// A row is blank when no quote appeared and it holds nothing but
/// whitespace in a single field (an empty or stray line in the file).
fn row_is_blank(row: &[String], row_quoted: bool) -> bool {
    !row_quoted && row.len() == 1 && row[0].trim().is_empty()
}

/// Strip an optional header row, detected by a literal match of the first
/// column against the expected header token.
fn strip_header<'a>(rows: &'a [Vec<String>], first_column: &str) -> &'a [Vec<String>] {
    match rows.first() {
        Some(first) if first.first().map(String::as_str) == Some(first_column) => &rows[1..],
        _ => rows,
    }
}

fn opt(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn field<'a>(row: &'a [String], idx: usize) -> &'a str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

fn malformed(row: usize, reason: &str) -> SyncError {
    SyncError::MalformedRecord {
        row,
        reason: reason.to_string(),
    }
}

// --- Tasks ---

pub fn tasks_to_csv(tasks: &[Task]) -> String {
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(tasks.len() + 1);
    rows.push(TASKS_HEADER.iter().map(|s| s.to_string()).collect());
    for task in tasks {
        rows.push(vec![
            task.id.clone(),
            task.title.clone(),
            task.status.code().to_string(),
            task.due_date.map(|d| d.to_string()).unwrap_or_default(),
            task.linked_note.clone().unwrap_or_default(),
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
            task.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]);
    }
    encode_rows(&rows)
}

fn task_from_row(row: &[String], idx: usize) -> Result<Task> {
    let id = field(row, 0);
    let title = field(row, 1);
    if id.is_empty() || title.is_empty() {
        return Err(malformed(idx, "missing id or title"));
    }
    let status = field(row, 2)
        .parse::<u8>()
        .ok()
        .and_then(TaskStatus::from_code)
        .ok_or_else(|| malformed(idx, "unknown status code"))?;
    let created_at =
        parse_timestamp(field(row, 5)).ok_or_else(|| malformed(idx, "bad createdAt"))?;
    let updated_at = parse_timestamp(field(row, 6)).unwrap_or(created_at);
    Ok(Task {
        id: id.to_string(),
        title: title.to_string(),
        status,
        due_date: field(row, 3).parse::<NaiveDate>().ok(),
        linked_note: opt(field(row, 4)),
        created_at,
        updated_at,
        completed_at: parse_timestamp(field(row, 7)),
    })
}

/// Decode tasks, skipping rows that are missing required fields. A bad
/// optional field degrades to `None` rather than dropping the row.
pub fn tasks_from_csv(text: &str) -> Vec<Task> {
    let rows = decode_rows(text);
    let data = strip_header(&rows, "id");
    let mut tasks = Vec::with_capacity(data.len());
    for (i, row) in data.iter().enumerate() {
        match task_from_row(row, i) {
            Ok(task) => tasks.push(task),
            Err(err) => warn!(%err, "skipping task row"),
        }
    }
    tasks
}

// --- Tags ---

pub fn tags_to_csv(tags: &[Tag]) -> String {
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(tags.len() + 1);
    rows.push(TAGS_HEADER.iter().map(|s| s.to_string()).collect());
    for tag in tags {
        rows.push(vec![
            tag.id.clone(),
            tag.name.clone(),
            tag.color.clone(),
            tag.created_at.to_rfc3339(),
            tag.updated_at.to_rfc3339(),
        ]);
    }
    encode_rows(&rows)
}

fn tag_from_row(row: &[String], idx: usize) -> Result<Tag> {
    let id = field(row, 0);
    let name = field(row, 1);
    if id.is_empty() || name.is_empty() {
        return Err(malformed(idx, "missing id or name"));
    }
    let created_at =
        parse_timestamp(field(row, 3)).ok_or_else(|| malformed(idx, "bad createdAt"))?;
    Ok(Tag {
        id: id.to_string(),
        name: name.to_string(),
        color: opt(field(row, 2)).unwrap_or_else(random_color),
        created_at,
        updated_at: parse_timestamp(field(row, 4)).unwrap_or(created_at),
    })
}

/// Decode tags. A missing color gets a fresh display color; a missing
/// updatedAt falls back to createdAt.
pub fn tags_from_csv(text: &str) -> Vec<Tag> {
    let rows = decode_rows(text);
    let data = strip_header(&rows, "id");
    let mut tags = Vec::with_capacity(data.len());
    for (i, row) in data.iter().enumerate() {
        match tag_from_row(row, i) {
            Ok(tag) => tags.push(tag),
            Err(err) => warn!(%err, "skipping tag row"),
        }
    }
    tags
}

// --- Task-tag links ---

pub fn task_tags_to_csv(links: &[TaskTag]) -> String {
    let mut rows: Vec<Vec<String>> = Vec::with_capacity(links.len() + 1);
    rows.push(TASK_TAGS_HEADER.iter().map(|s| s.to_string()).collect());
    for link in links {
        rows.push(vec![
            link.id.clone(),
            link.task_id.clone(),
            link.tag_id.clone(),
            link.created_at.to_rfc3339(),
        ]);
    }
    encode_rows(&rows)
}

fn task_tag_from_row(row: &[String], idx: usize) -> Result<TaskTag> {
    let id = field(row, 0);
    let task_id = field(row, 1);
    let tag_id = field(row, 2);
    if id.is_empty() || task_id.is_empty() || tag_id.is_empty() {
        return Err(malformed(idx, "missing link ids"));
    }
    let created_at =
        parse_timestamp(field(row, 3)).ok_or_else(|| malformed(idx, "bad createdAt"))?;
    Ok(TaskTag {
        id: id.to_string(),
        task_id: task_id.to_string(),
        tag_id: tag_id.to_string(),
        created_at,
    })
}

pub fn task_tags_from_csv(text: &str) -> Vec<TaskTag> {
    let rows = decode_rows(text);
    let data = strip_header(&rows, "id");
    let mut links = Vec::with_capacity(data.len());
    for (i, row) in data.iter().enumerate() {
        match task_tag_from_row(row, i) {
            Ok(link) => links.push(link),
            Err(err) => warn!(%err, "skipping link row"),
        }
    }
    links
}
