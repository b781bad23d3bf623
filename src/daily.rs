//! Daily digest engine.
//!
//! One human-editable document per calendar day, named by a date pattern,
//! holding a managed tasks section plus arbitrary human content. The
//! engine renders the section deterministically (re-rendering the same
//! task set is byte-identical), replaces only the managed byte range on
//! update, and reads checkbox edits back out of the same section.

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::links::to_wiki_link;
use crate::types::{Task, TaskStatus};
use crate::vault::{DirectoryHandle, ensure_directory};
use chrono::{DateTime, NaiveDate, Utc};
use regex_lite::Regex;
use std::sync::Arc;
use tracing::{debug, info};

/// Line rendered into an otherwise empty tasks section.
const EMPTY_SECTION_LINE: &str = "No tasks for today.";

/// Apply the `YYYY`/`MM`/`DD`/`M`/`D` tokens of a date pattern. Longer
/// tokens are substituted first so `MM` is never half-eaten by `M`.
pub fn format_date_pattern(pattern: &str, date: NaiveDate) -> String {
    pattern
        .replace("YYYY", &date.format("%Y").to_string())
        .replace("MM", &date.format("%m").to_string())
        .replace("DD", &date.format("%d").to_string())
        .replace('M', &date.format("%-m").to_string())
        .replace('D', &date.format("%-d").to_string())
}

/// File name of the digest for a given date.
pub fn daily_note_file_name(pattern: &str, date: NaiveDate) -> String {
    format!("{}.md", format_date_pattern(pattern, date))
}

/// Render one task as a digest checklist line.
pub fn render_task_line(task: &Task) -> String {
    let mut line = format!("- {} {}", task.status.mark(), task.title);
    if let Some(due) = task.due_date {
        line.push_str(&format!(" 📅 {}", due));
    }
    if let Some(ref note) = task.linked_note {
        line.push_str(&format!(" 📎 {}", to_wiki_link(note)));
    }
    line
}

/// Render the managed tasks section: heading, blank line, one line per
/// task. Deterministic for a fixed task set.
pub fn render_section(heading: &str, tasks: &[&Task]) -> String {
    let mut section = format!("{}\n\n", heading);
    if tasks.is_empty() {
        section.push_str(EMPTY_SECTION_LINE);
        section.push('\n');
    } else {
        for task in tasks {
            section.push_str(&render_task_line(task));
            section.push('\n');
        }
    }
    section
}

/// Byte range of the managed section: from the start of the heading line
/// through the character before the next `\n##` (or end of document).
fn find_section_range(document: &str, heading: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in document.split('\n') {
        if line.trim_end() == heading {
            let search_from = offset + line.len();
            let end = document[search_from..]
                .find("\n##")
                .map(|i| search_from + i)
                .unwrap_or(document.len());
            return Some((offset, end));
        }
        offset += line.len() + 1;
    }
    None
}

/// Replace the managed section, or append it when the heading is absent.
/// Every byte outside the managed range is preserved verbatim.
pub fn upsert_section(document: &str, heading: &str, section: &str) -> String {
    match find_section_range(document, heading) {
        Some((start, end)) => {
            let mut out = String::with_capacity(document.len() + section.len());
            out.push_str(&document[..start]);
            out.push_str(section);
            out.push_str(&document[end..]);
            out
        }
        None => {
            let mut out = document.trim_end_matches('\n').to_string();
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(section);
            out
        }
    }
}

/// Expand `{{date:FORMAT}}` tokens in a document template. An empty
/// template falls back to a minimal document carrying the tasks heading.
pub fn expand_template(template: &str, heading: &str, pattern: &str, date: NaiveDate) -> String {
    if template.trim().is_empty() {
        return format!(
            "# {}\n\n{}\n\n## Notes\n",
            format_date_pattern(pattern, date),
            heading
        );
    }
    let re = Regex::new(r"\{\{date:([^}]*)\}\}").expect("template token regex");
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in re.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0");
        out.push_str(&template[last..whole.start()]);
        out.push_str(&format_date_pattern(&caps[1], date));
        last = whole.end();
    }
    out.push_str(&template[last..]);
    out
}

/// Map a checklist line's checkbox token back to a status. The completed
/// mark is checked first; `[X]` and `[-]` are accepted spellings.
fn status_from_line(line: &str) -> Option<TaskStatus> {
    if line.contains("[x]") || line.contains("[X]") {
        Some(TaskStatus::Completed)
    } else if line.contains("[/]") || line.contains("[-]") {
        Some(TaskStatus::InProgress)
    } else if line.contains("[ ]") {
        Some(TaskStatus::NotStarted)
    } else {
        None
    }
}

/// Parse the managed section and propose status updates for tasks whose
/// checkbox no longer matches their current status. Lines are matched to
/// tasks by literal title containment; ties (no implied change) are
/// skipped. Returned tasks carry restamped timestamps.
pub fn detect_status_changes(
    document: &str,
    heading: &str,
    tasks: &[Task],
    now: DateTime<Utc>,
) -> Vec<Task> {
    let Some((start, end)) = find_section_range(document, heading) else {
        return Vec::new();
    };
    let lines: Vec<&str> = document[start..end]
        .lines()
        .skip(1) // heading line
        .filter(|l| l.trim_start().starts_with("- "))
        .collect();

    let mut updates = Vec::new();
    for task in tasks {
        let Some(line) = lines.iter().find(|l| l.contains(&task.title)) else {
            continue;
        };
        let Some(parsed) = status_from_line(line) else {
            continue;
        };
        if parsed != task.status {
            let mut updated = task.clone();
            updated.apply_status(parsed, now);
            updates.push(updated);
        }
    }
    updates
}

/// Render or update today's digest in the vault. A missing document is
/// created from the expanded template; an existing one has only its
/// managed section replaced.
pub async fn update_daily_note(
    root: &Arc<dyn DirectoryHandle>,
    config: &Config,
    tasks: &[&Task],
    today: NaiveDate,
) -> Result<()> {
    let dir = ensure_directory(root, &config.daily_note_folder).await?;
    let file = daily_note_file_name(&config.daily_note_format, today);
    let section = render_section(&config.daily_note_section, tasks);

    let content = match dir.read_text(&file).await {
        Ok(existing) => upsert_section(&existing, &config.daily_note_section, &section),
        Err(SyncError::NotFound { .. }) => {
            debug!(file, "daily note absent, expanding template");
            let base = expand_template(
                &config.daily_note_template,
                &config.daily_note_section,
                &config.daily_note_format,
                today,
            );
            upsert_section(&base, &config.daily_note_section, &section)
        }
        Err(err) => return Err(err),
    };

    dir.write_text(&file, &content).await?;
    info!(file, tasks = tasks.len(), "daily note updated");
    Ok(())
}

/// Read today's digest and propose status updates from human checkbox
/// edits. An absent digest yields no updates.
pub async fn detect_daily_note_changes(
    root: &Arc<dyn DirectoryHandle>,
    config: &Config,
    tasks: &[Task],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let dir = ensure_directory(root, &config.daily_note_folder).await?;
    let file = daily_note_file_name(&config.daily_note_format, today);
    let content = match dir.read_text(&file).await {
        Ok(content) => content,
        Err(SyncError::NotFound { .. }) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    Ok(detect_status_changes(
        &content,
        &config.daily_note_section,
        tasks,
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_pattern_substitutes_all_tokens() {
        let d = date(2026, 3, 7);
        assert_eq!(format_date_pattern("YYYY-MM-DD", d), "2026-03-07");
        assert_eq!(format_date_pattern("YYYY/M/D", d), "2026/3/7");
        assert_eq!(daily_note_file_name("YYYY-MM-DD", d), "2026-03-07.md");
    }

    #[test]
    fn task_line_includes_markers_only_when_present() {
        let now = Utc::now();
        let plain = Task::new("Water plants", None, None, now);
        assert_eq!(render_task_line(&plain), "- [ ] Water plants");

        let full = Task::new(
            "Draft report",
            Some(date(2026, 8, 30)),
            Some("Projects/Q3".into()),
            now,
        );
        assert_eq!(
            render_task_line(&full),
            "- [ ] Draft report 📅 2026-08-30 📎 [[Projects/Q3]]"
        );
    }

    #[test]
    fn empty_section_renders_placeholder() {
        let section = render_section("## Tasks", &[]);
        assert_eq!(section, "## Tasks\n\nNo tasks for today.\n");
    }

    #[test]
    fn upsert_preserves_surrounding_content() {
        let doc = "# 2026-08-29\n\n## Tasks\n\nold line\n\n## Notes\n\nhand-written\n";
        let now = Utc::now();
        let task = Task::new("New task", None, None, now);
        let section = render_section("## Tasks", &[&task]);
        let updated = upsert_section(doc, "## Tasks", &section);
        assert!(updated.starts_with("# 2026-08-29\n\n## Tasks\n\n- [ ] New task\n"));
        assert!(updated.ends_with("## Notes\n\nhand-written\n"));
    }

    #[test]
    fn upsert_appends_when_heading_absent() {
        let doc = "# Journal\n\nsome text\n";
        let updated = upsert_section(doc, "## Tasks", "## Tasks\n\nNo tasks for today.\n");
        assert!(updated.ends_with("some text\n\n## Tasks\n\nNo tasks for today.\n"));
    }

    #[test]
    fn upsert_is_idempotent() {
        let now = Utc::now();
        let tasks = vec![
            Task::new("One", Some(date(2026, 1, 2)), None, now),
            Task::new("Two", None, Some("[[Notes/two]]".into()), now),
        ];
        let refs: Vec<&Task> = tasks.iter().collect();
        let section = render_section("## Tasks", &refs);

        let base = expand_template("", "## Tasks", "YYYY-MM-DD", date(2026, 1, 2));
        let once = upsert_section(&base, "## Tasks", &section);
        let twice = upsert_section(&once, "## Tasks", &section);
        assert_eq!(once, twice);
    }

    #[test]
    fn template_date_tokens_expand() {
        let out = expand_template(
            "# {{date:YYYY-MM-DD}}\n\n## Tasks\n\n## Log {{date:M/D}}\n",
            "## Tasks",
            "YYYY-MM-DD",
            date(2026, 8, 29),
        );
        assert!(out.starts_with("# 2026-08-29\n"));
        assert!(out.contains("## Log 8/29\n"));
    }

    #[test]
    fn detects_hand_edited_checkbox() {
        let now = Utc::now();
        let task = Task::new("Buy milk", None, None, now);
        let doc = "# Today\n\n## Tasks\n\n- [x] Buy milk\n\n## Notes\n";
        let updates = detect_status_changes(doc, "## Tasks", std::slice::from_ref(&task), now);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, TaskStatus::Completed);
        assert!(updates[0].completed_at.is_some());
    }

    #[test]
    fn unchanged_checkbox_is_skipped() {
        let now = Utc::now();
        let task = Task::new("Buy milk", None, None, now);
        let doc = "## Tasks\n\n- [ ] Buy milk\n";
        assert!(detect_status_changes(doc, "## Tasks", std::slice::from_ref(&task), now).is_empty());
    }

    #[test]
    fn detect_accepts_alternate_mark_spellings() {
        let now = Utc::now();
        let a = Task::new("Alpha", None, None, now);
        let b = Task::new("Beta", None, None, now);
        let doc = "## Tasks\n\n- [X] Alpha\n- [-] Beta\n";
        let updates = detect_status_changes(doc, "## Tasks", &[a, b], now);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].status, TaskStatus::Completed);
        assert_eq!(updates[1].status, TaskStatus::InProgress);
    }
}
