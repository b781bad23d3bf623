//! End-to-end synchronization against a real directory: record store,
//! capability handles, and the synchronizer working together.

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tempfile::TempDir;
use vault_tasks_sync::config::Config;
use vault_tasks_sync::store::RecordStore;
use vault_tasks_sync::sync::Synchronizer;
use vault_tasks_sync::types::{Task, TaskStatus, TaskTag, add_link, get_or_create_tag};
use vault_tasks_sync::vault::{HandleCache, LocalVault};

async fn open_store(dir: &TempDir) -> (Arc<HandleCache>, RecordStore) {
    let cache = Arc::new(HandleCache::new());
    cache
        .cache("vault", Arc::new(LocalVault::new(dir.path())))
        .await
        .unwrap();
    let store = RecordStore::new(Arc::clone(&cache), "vault", "tasks");
    (cache, store)
}

fn synchronizer(store: RecordStore, first_sync: bool) -> Synchronizer {
    Synchronizer::new(store, Config::default(), first_sync)
}

fn sample_task(title: &str) -> Task {
    Task::new(title, None, None, Utc::now() - Duration::minutes(10))
}

#[tokio::test]
async fn absent_collection_files_read_as_empty() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;
    assert!(store.read_tasks().await.unwrap().is_empty());
    assert!(store.read_tags().await.unwrap().is_empty());
    assert!(store.read_task_tags().await.unwrap().is_empty());
}

#[tokio::test]
async fn first_sync_seeds_an_empty_vault_from_local() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;
    let sync = synchronizer(store, true);

    let local = vec![sample_task("One"), sample_task("Two")];
    let outcome = sync.sync_tasks(&local).await.unwrap();
    assert_eq!(outcome.merged.len(), 2);
    assert!(outcome.changed);

    let durable = sync.store().read_tasks().await.unwrap();
    assert_eq!(durable.len(), 2);
    assert_eq!(durable[0].title, "One");
}

#[tokio::test]
async fn first_sync_replaces_local_with_a_populated_vault() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;
    store.write_tasks(&[sample_task("Durable truth")]).await.unwrap();
    let sync = synchronizer(store, true);

    let local = vec![sample_task("Stale local")];
    let outcome = sync.sync_tasks(&local).await.unwrap();
    assert_eq!(outcome.merged.len(), 1);
    assert_eq!(outcome.merged[0].title, "Durable truth");
    assert!(outcome.changed);
}

#[tokio::test]
async fn first_sync_bootstrap_only_applies_once() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;
    store.write_tasks(&[sample_task("Durable truth")]).await.unwrap();
    let sync = synchronizer(store, true);

    let stale = vec![sample_task("Stale local")];
    sync.sync_tasks(&stale).await.unwrap();

    // Second pass merges normally: a local-only record is kept now.
    let mut local = sync.store().read_tasks().await.unwrap();
    local.push(sample_task("Fresh local"));
    let outcome = sync.sync_tasks(&local).await.unwrap();
    let titles: Vec<&str> = outcome.merged.iter().map(|t| t.title.as_str()).collect();
    assert!(titles.contains(&"Durable truth"));
    assert!(titles.contains(&"Fresh local"));
}

#[tokio::test]
async fn sync_writes_merged_tasks_through_to_the_vault() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;
    let sync = synchronizer(store, false);

    let mut task = sample_task("Flip me");
    sync.sync_tasks(&[task.clone()]).await.unwrap();

    task.apply_status(TaskStatus::Completed, Utc::now());
    sync.sync_tasks(&[task.clone()]).await.unwrap();

    let durable = sync.store().read_tasks().await.unwrap();
    assert_eq!(durable.len(), 1);
    assert_eq!(durable[0].status, TaskStatus::Completed);
    assert!(durable[0].completed_at.is_some());
}

#[tokio::test]
async fn completed_status_survives_a_newer_durable_rename() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;

    let now = Utc::now();
    let mut local = Task::new("Old name", None, None, now - Duration::minutes(15));
    local.apply_status(TaskStatus::Completed, now - Duration::minutes(15));
    let mut durable = local.clone();
    durable.title = "New name".to_string();
    durable.status = TaskStatus::NotStarted;
    durable.completed_at = None;
    durable.updated_at = now - Duration::minutes(5);
    store.write_tasks(&[durable]).await.unwrap();

    let sync = synchronizer(store, false);
    let outcome = sync.sync_tasks(&[local.clone()]).await.unwrap();
    assert_eq!(outcome.merged[0].title, "New name");
    assert_eq!(outcome.merged[0].status, TaskStatus::Completed);
    assert_eq!(outcome.merged[0].completed_at, local.completed_at);
}

#[tokio::test]
async fn tag_and_link_collections_round_trip_through_sync() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;
    let sync = synchronizer(store, false);

    let now = Utc::now();
    let task = sample_task("Tagged");
    let mut tags = Vec::new();
    let tag = get_or_create_tag(&mut tags, "urgent", now);
    let mut links: Vec<TaskTag> = Vec::new();
    add_link(&mut links, &task.id, &tag.id, now);

    sync.sync_tasks(std::slice::from_ref(&task)).await.unwrap();
    let (tag_outcome, link_outcome) = sync.sync_tags(&tags, &links).await.unwrap();
    assert_eq!(tag_outcome.merged.len(), 1);
    assert_eq!(link_outcome.merged.len(), 1);

    let durable_tags = sync.store().read_tags().await.unwrap();
    let durable_links = sync.store().read_task_tags().await.unwrap();
    assert_eq!(durable_tags[0].name, "urgent");
    assert_eq!(durable_links[0].task_id, task.id);
    assert_eq!(durable_links[0].tag_id, tag.id);
}

#[tokio::test]
async fn revoked_handle_surfaces_as_a_reselection_error() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(HandleCache::new());
    let vault = LocalVault::new(dir.path());
    let flag = vault.permission_flag();
    cache.cache("vault", Arc::new(vault)).await.unwrap();
    let store = RecordStore::new(Arc::clone(&cache), "vault", "tasks");
    let sync = synchronizer(store, false);

    sync.sync_tasks(&[sample_task("Before revocation")]).await.unwrap();

    flag.store(false, Ordering::SeqCst);
    let err = sync.sync_tasks(&[]).await.unwrap_err();
    assert!(err.needs_reselection(), "unexpected error: {err}");

    // The failed resolve evicted the handle, so the error persists until
    // the capability is re-acquired.
    let err = sync.store().read_tasks().await.unwrap_err();
    assert!(err.needs_reselection());
}

#[tokio::test]
async fn reacquiring_the_capability_restores_access() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(HandleCache::new());
    let vault = LocalVault::new(dir.path());
    let flag = vault.permission_flag();
    cache.cache("vault", Arc::new(vault)).await.unwrap();
    let store = RecordStore::new(Arc::clone(&cache), "vault", "tasks");
    let sync = synchronizer(store, false);

    sync.sync_tasks(&[sample_task("Survivor")]).await.unwrap();
    flag.store(false, Ordering::SeqCst);
    assert!(sync.store().read_tasks().await.is_err());

    cache
        .cache("vault", Arc::new(LocalVault::new(dir.path())))
        .await
        .unwrap();
    let tasks = sync.store().read_tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Survivor");
}

#[tokio::test]
async fn ensure_linked_note_creates_a_stub_once() {
    let dir = TempDir::new().unwrap();
    let (_cache, store) = open_store(&dir).await;
    let sync = synchronizer(store, false);

    sync.ensure_linked_note("[[Project Plan]]").await.unwrap();
    let path = dir.path().join("notes").join("Project Plan.md");
    let first = std::fs::read_to_string(&path).unwrap();
    assert_eq!(first, "# Project Plan\n");

    // A second call must not clobber existing content.
    std::fs::write(&path, "# Project Plan\n\nEdited by hand.\n").unwrap();
    sync.ensure_linked_note("Project Plan").await.unwrap();
    let second = std::fs::read_to_string(&path).unwrap();
    assert!(second.contains("Edited by hand."));
}
