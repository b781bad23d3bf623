//! Daily digest lifecycle against a real vault directory.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tempfile::TempDir;
use vault_tasks_sync::config::Config;
use vault_tasks_sync::daily::{detect_daily_note_changes, update_daily_note};
use vault_tasks_sync::types::{Task, TaskStatus};
use vault_tasks_sync::vault::{DirectoryHandle, LocalVault};

fn root(dir: &TempDir) -> Arc<dyn DirectoryHandle> {
    Arc::new(LocalVault::new(dir.path()))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 29).unwrap()
}

fn note_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("daily").join("2026-08-29.md")
}

#[tokio::test]
async fn creates_note_from_default_template() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let task = Task::new("Water plants", None, None, Utc::now());

    update_daily_note(&root(&dir), &config, &[&task], today())
        .await
        .unwrap();

    let content = std::fs::read_to_string(note_path(&dir)).unwrap();
    assert!(content.starts_with("# 2026-08-29\n"));
    assert!(content.contains("## Tasks\n\n- [ ] Water plants\n"));
    assert!(content.contains("## Notes"));
}

#[tokio::test]
async fn repeated_updates_are_byte_identical() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let now = Utc::now();
    let tasks = vec![
        Task::new("One", NaiveDate::from_ymd_opt(2026, 8, 30), None, now),
        Task::new("Two", None, Some("Projects/Two".into()), now),
    ];
    let refs: Vec<&Task> = tasks.iter().collect();
    let handle = root(&dir);

    update_daily_note(&handle, &config, &refs, today()).await.unwrap();
    let first = std::fs::read_to_string(note_path(&dir)).unwrap();
    update_daily_note(&handle, &config, &refs, today()).await.unwrap();
    let second = std::fs::read_to_string(note_path(&dir)).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn update_preserves_human_content_outside_the_section() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let handle = root(&dir);
    let task = Task::new("Tracked", None, None, Utc::now());

    update_daily_note(&handle, &config, &[&task], today()).await.unwrap();

    // Simulate hand edits outside the managed section.
    let path = note_path(&dir);
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("\nMeeting notes go here.\n");
    std::fs::write(&path, &content).unwrap();

    let renamed = Task::new("Tracked again", None, None, Utc::now());
    update_daily_note(&handle, &config, &[&renamed], today()).await.unwrap();

    let updated = std::fs::read_to_string(&path).unwrap();
    assert!(updated.contains("- [ ] Tracked again"));
    assert!(!updated.contains("- [ ] Tracked\n"));
    assert!(updated.contains("Meeting notes go here."));
}

#[tokio::test]
async fn respects_custom_folder_format_and_template() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.daily_note_folder = "journal".into();
    config.daily_note_format = "D-M-YYYY".into();
    config.daily_note_template = "# Journal {{date:M/D}}\n\n## Tasks\n".into();

    update_daily_note(&root(&dir), &config, &[], today()).await.unwrap();

    let path = dir.path().join("journal").join("29-8-2026.md");
    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.starts_with("# Journal 8/29\n"));
    assert!(content.contains("No tasks for today."));
}

#[tokio::test]
async fn hand_checked_box_is_detected_and_reapplied() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let handle = root(&dir);
    let now = Utc::now();
    let task = Task::new("Buy milk", None, None, now);

    update_daily_note(&handle, &config, &[&task], today()).await.unwrap();

    // Human ticks the checkbox in the digest.
    let path = note_path(&dir);
    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, content.replace("- [ ] Buy milk", "- [x] Buy milk")).unwrap();

    let updates = detect_daily_note_changes(
        &handle,
        &config,
        std::slice::from_ref(&task),
        today(),
        Utc::now(),
    )
    .await
    .unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].id, task.id);
    assert_eq!(updates[0].status, TaskStatus::Completed);
    assert!(updates[0].completed_at.is_some());
}

#[tokio::test]
async fn absent_note_yields_no_detections() {
    let dir = TempDir::new().unwrap();
    let config = Config::default();
    let task = Task::new("Nothing yet", None, None, Utc::now());
    let updates = detect_daily_note_changes(
        &root(&dir),
        &config,
        std::slice::from_ref(&task),
        today(),
        Utc::now(),
    )
    .await
    .unwrap();
    assert!(updates.is_empty());
}
