//! Command-line front end for vault task synchronization.
//!
//! Each mutating command loads the durable copy as its local set, applies
//! the change, runs an explicit synchronization pass, and regenerates the
//! daily digest. The `--vault` directory plays the role of the external
//! capability picker: it is cached once and every operation goes through
//! the re-validated handle.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use vault_tasks_sync::config::Config;
use vault_tasks_sync::logging::init_logging;
use vault_tasks_sync::store::RecordStore;
use vault_tasks_sync::sync::Synchronizer;
use vault_tasks_sync::types::{Task, TaskPatch, TaskStatus, add_link, delete_tag,
    find_tag_by_name, get_or_create_tag, remove_link, tags_for_task, task_ids_for_tag};
use vault_tasks_sync::vault::{HandleCache, LocalVault};

/// Sync a local task list with a plain-text vault
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the vault directory
    #[arg(long, global = true, env = "VAULT_TASKS_DIR")]
    vault: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a task and sync it into the vault
    Add {
        title: String,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Linked note name (created in the note folder if missing)
        #[arg(long)]
        note: Option<String>,
        /// Tags to attach, created on first use
        #[arg(long)]
        tag: Vec<String>,
    },

    /// List tasks from the vault
    List {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Edit a task's title, due date, or linked note
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// New due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// New linked note name
        #[arg(long, conflicts_with = "clear_note")]
        note: Option<String>,
        /// Remove the note link
        #[arg(long)]
        clear_note: bool,
    },

    /// Set a task's status (not-started, in-progress, completed)
    Status { id: String, state: String },

    /// Delete a task
    Rm { id: String },

    /// Attach a tag to a task, creating the tag on first use
    Tag { id: String, name: String },

    /// Detach a tag from a task
    Untag { id: String, name: String },

    /// Delete a tag and cascade to every link referencing it
    TagRm { name: String },

    /// Run a full synchronization pass, applying daily-note checkbox
    /// edits and regenerating the digest
    Sync,

    /// Regenerate today's daily digest note
    Daily,

    /// Show status changes implied by daily-note checkbox edits
    Detect {
        /// Apply the detected changes instead of only printing them
        #[arg(long)]
        apply: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, cli.verbose)?;

    let config = Config::load(cli.config.as_deref())?;
    let vault_dir = cli
        .vault
        .clone()
        .context("no vault directory; pass --vault or set VAULT_TASKS_DIR")?;

    // Acquire and cache the vault capability once, up front, so permission
    // problems surface before any command logic runs.
    let cache = Arc::new(HandleCache::new());
    cache
        .cache(&config.vault_key, Arc::new(LocalVault::new(&vault_dir)))
        .await
        .with_context(|| format!("cannot access vault at {}", vault_dir.display()))?;

    let store = RecordStore::new(
        Arc::clone(&cache),
        config.vault_key.clone(),
        config.task_folder.clone(),
    );
    // The CLI's local set is loaded from the durable copy, so the
    // first-sync bootstrap path is already satisfied.
    let synchronizer = Synchronizer::new(store, config, false);

    match cli.command {
        Command::Add { title, due, note, tag } => {
            add_task(&synchronizer, title, due, note, tag).await
        }
        Command::List { json } => list_tasks(&synchronizer, json).await,
        Command::Edit { id, title, due, clear_due, note, clear_note } => {
            let patch = TaskPatch {
                title,
                status: None,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
                linked_note: if clear_note { Some(None) } else { note.map(Some) },
            };
            edit_task(&synchronizer, &id, patch).await
        }
        Command::Status { id, state } => set_status(&synchronizer, &id, &state).await,
        Command::Rm { id } => remove_task(&synchronizer, &id).await,
        Command::Tag { id, name } => tag_task(&synchronizer, &id, &name).await,
        Command::Untag { id, name } => untag_task(&synchronizer, &id, &name).await,
        Command::TagRm { name } => remove_tag(&synchronizer, &name).await,
        Command::Sync => full_sync(&synchronizer).await,
        Command::Daily => regenerate_daily(&synchronizer).await,
        Command::Detect { apply } => detect(&synchronizer, apply).await,
    }
}

/// Find a task by exact id, unique id prefix, or exact title.
fn find_task<'a>(tasks: &'a [Task], query: &str) -> Result<&'a Task> {
    if let Some(task) = tasks.iter().find(|t| t.id == query || t.title == query) {
        return Ok(task);
    }
    let matches: Vec<&Task> = tasks.iter().filter(|t| t.id.starts_with(query)).collect();
    match matches.as_slice() {
        [task] => Ok(task),
        [] => bail!("no task matches '{}'", query),
        _ => bail!("'{}' is ambiguous ({} matches)", query, matches.len()),
    }
}

async fn add_task(
    sync: &Synchronizer,
    title: String,
    due: Option<NaiveDate>,
    note: Option<String>,
    tag_names: Vec<String>,
) -> Result<()> {
    if title.trim().is_empty() {
        bail!("task title must not be empty");
    }
    let now = chrono::Utc::now();
    let mut tasks = sync.store().read_tasks().await?;
    let task = Task::new(title.trim(), due, note.clone(), now);
    let task_id = task.id.clone();
    tasks.push(task);

    if let Some(ref note) = note {
        sync.ensure_linked_note(note).await?;
    }

    let outcome = sync.sync_tasks(&tasks).await?;

    if !tag_names.is_empty() {
        let mut tags = sync.store().read_tags().await?;
        let mut links = sync.store().read_task_tags().await?;
        for name in &tag_names {
            let tag = get_or_create_tag(&mut tags, name, now);
            add_link(&mut links, &task_id, &tag.id, now);
        }
        sync.sync_tags(&tags, &links).await?;
    }

    sync.update_daily_note(&outcome.merged).await?;
    println!("added {}", task_id);
    Ok(())
}

async fn list_tasks(sync: &Synchronizer, json: bool) -> Result<()> {
    let tasks = sync.store().read_tasks().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }
    let tags = sync.store().read_tags().await?;
    let links = sync.store().read_task_tags().await?;
    for task in &tasks {
        let mut line = format!("{} {} {}", task.status.mark(), task.id, task.title);
        if let Some(due) = task.due_date {
            line.push_str(&format!(" (due {})", due));
        }
        let names: Vec<&str> = tags_for_task(&task.id, &links, &tags)
            .into_iter()
            .map(|t| t.name.as_str())
            .collect();
        if !names.is_empty() {
            line.push_str(&format!(" [{}]", names.join(", ")));
        }
        println!("{}", line);
    }
    Ok(())
}

async fn edit_task(sync: &Synchronizer, query: &str, patch: TaskPatch) -> Result<()> {
    let mut tasks = sync.store().read_tasks().await?;
    let id = find_task(&tasks, query)?.id.clone();
    if let Some(Some(ref note)) = patch.linked_note {
        sync.ensure_linked_note(note).await?;
    }
    let now = chrono::Utc::now();
    for task in tasks.iter_mut().filter(|t| t.id == id) {
        task.apply_update(patch.clone(), now);
    }
    let outcome = sync.sync_tasks(&tasks).await?;
    sync.update_daily_note(&outcome.merged).await?;
    println!("updated {}", id);
    Ok(())
}

async fn set_status(sync: &Synchronizer, query: &str, state: &str) -> Result<()> {
    let Some(status) = TaskStatus::parse(state) else {
        bail!("unknown status '{}' (expected not-started, in-progress, or completed)", state);
    };
    let mut tasks = sync.store().read_tasks().await?;
    let id = find_task(&tasks, query)?.id.clone();
    let now = chrono::Utc::now();
    for task in tasks.iter_mut().filter(|t| t.id == id) {
        task.apply_status(status, now);
    }
    let outcome = sync.sync_tasks(&tasks).await?;
    sync.update_daily_note(&outcome.merged).await?;
    println!("{} -> {}", id, status);
    Ok(())
}

async fn remove_task(sync: &Synchronizer, query: &str) -> Result<()> {
    let mut tasks = sync.store().read_tasks().await?;
    let id = find_task(&tasks, query)?.id.clone();
    tasks.retain(|t| t.id != id);
    // Explicit delete: write directly instead of merging, which would
    // re-adopt the durable-only record. Link rows referencing the task
    // are left in place; resolvers treat them as orphans.
    sync.store().write_tasks(&tasks).await?;
    sync.update_daily_note(&tasks).await?;
    println!("removed {}", id);
    Ok(())
}

async fn tag_task(sync: &Synchronizer, query: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("tag name must not be empty");
    }
    let tasks = sync.store().read_tasks().await?;
    let id = find_task(&tasks, query)?.id.clone();
    let now = chrono::Utc::now();
    let mut tags = sync.store().read_tags().await?;
    let mut links = sync.store().read_task_tags().await?;
    let tag = get_or_create_tag(&mut tags, name, now);
    if add_link(&mut links, &id, &tag.id, now).is_none() {
        println!("{} already tagged '{}'", id, tag.name);
        return Ok(());
    }
    sync.sync_tags(&tags, &links).await?;
    println!("tagged {} with '{}'", id, tag.name);
    Ok(())
}

async fn untag_task(sync: &Synchronizer, query: &str, name: &str) -> Result<()> {
    let tasks = sync.store().read_tasks().await?;
    let id = find_task(&tasks, query)?.id.clone();
    let tags = sync.store().read_tags().await?;
    let Some(tag) = find_tag_by_name(&tags, name) else {
        bail!("no tag named '{}'", name);
    };
    let mut links = sync.store().read_task_tags().await?;
    remove_link(&mut links, &id, &tag.id);
    // Explicit link delete bypasses the union merge.
    sync.store().write_task_tags(&links).await?;
    println!("untagged '{}' from {}", tag.name, id);
    Ok(())
}

async fn remove_tag(sync: &Synchronizer, name: &str) -> Result<()> {
    let mut tags = sync.store().read_tags().await?;
    let Some(tag) = find_tag_by_name(&tags, name) else {
        bail!("no tag named '{}'", name);
    };
    let tag_id = tag.id.clone();
    let mut links = sync.store().read_task_tags().await?;
    let cascaded = task_ids_for_tag(&tag_id, &links).len();
    delete_tag(&mut tags, &mut links, &tag_id);
    sync.store().write_tags(&tags).await?;
    sync.store().write_task_tags(&links).await?;
    println!("removed tag '{}' and {} link(s)", name, cascaded);
    Ok(())
}

async fn full_sync(sync: &Synchronizer) -> Result<()> {
    let mut tasks = sync.store().read_tasks().await?;
    let updates = sync.detect_daily_note_changes(&tasks).await?;
    if !updates.is_empty() {
        println!("applying {} daily-note edit(s)", updates.len());
        apply_updates(&mut tasks, updates);
    }
    let outcome = sync.sync_tasks(&tasks).await?;
    sync.update_daily_note(&outcome.merged).await?;
    println!(
        "synced {} task(s){}",
        outcome.merged.len(),
        if outcome.changed { " (changed)" } else { "" }
    );
    Ok(())
}

async fn regenerate_daily(sync: &Synchronizer) -> Result<()> {
    let tasks = sync.store().read_tasks().await?;
    sync.update_daily_note(&tasks).await?;
    println!("daily note updated");
    Ok(())
}

async fn detect(sync: &Synchronizer, apply: bool) -> Result<()> {
    let mut tasks = sync.store().read_tasks().await?;
    let updates = sync.detect_daily_note_changes(&tasks).await?;
    if updates.is_empty() {
        println!("no status changes detected");
        return Ok(());
    }
    for update in &updates {
        println!("{} -> {} ({})", update.id, update.status, update.title);
    }
    if apply {
        apply_updates(&mut tasks, updates);
        let outcome = sync.sync_tasks(&tasks).await?;
        sync.update_daily_note(&outcome.merged).await?;
    }
    Ok(())
}

/// Replace tasks in-place by id with their updated versions.
fn apply_updates(tasks: &mut [Task], updates: Vec<Task>) {
    for update in updates {
        if let Some(slot) = tasks.iter_mut().find(|t| t.id == update.id) {
            *slot = update;
        }
    }
}
