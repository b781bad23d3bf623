//! Configuration surface.
//!
//! Settings are plain YAML with per-field defaults, discovered in order:
//! explicit path, `VAULT_TASKS_CONFIG_PATH`, `./vault-tasks-sync.yaml`,
//! then `~/.vault-tasks-sync/config.yaml`. A missing discovery file falls
//! through silently; malformed YAML is an error.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "VAULT_TASKS_CONFIG_PATH";

/// Project-level config file name, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "vault-tasks-sync.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cache key under which the vault capability handle is stored.
    #[serde(default = "default_vault_key")]
    pub vault_key: String,

    /// Subdirectory of the vault holding the three record files.
    #[serde(default = "default_task_folder")]
    pub task_folder: String,

    /// Subdirectory of the vault where linked notes are created.
    #[serde(default = "default_note_folder")]
    pub note_folder: String,

    /// Whether the daily digest note is maintained at all.
    #[serde(default = "default_true")]
    pub daily_note_enabled: bool,

    /// Subdirectory of the vault holding daily digest notes.
    #[serde(default = "default_daily_note_folder")]
    pub daily_note_folder: String,

    /// Date pattern for digest file names (`YYYY`, `MM`, `DD`, `M`, `D`).
    #[serde(default = "default_daily_note_format")]
    pub daily_note_format: String,

    /// Heading that delimits the managed tasks section.
    #[serde(default = "default_daily_note_section")]
    pub daily_note_section: String,

    /// Template for newly created digests; `{{date:FORMAT}}` tokens are
    /// expanded. Empty means the built-in minimal template.
    #[serde(default)]
    pub daily_note_template: String,

    /// When true the digest lists every open task; when false only tasks
    /// due today.
    #[serde(default = "default_true")]
    pub daily_note_all_tasks: bool,
}

fn default_vault_key() -> String {
    "vault".to_string()
}

fn default_task_folder() -> String {
    "tasks".to_string()
}

fn default_note_folder() -> String {
    "notes".to_string()
}

fn default_daily_note_folder() -> String {
    "daily".to_string()
}

fn default_daily_note_format() -> String {
    "YYYY-MM-DD".to_string()
}

fn default_daily_note_section() -> String {
    "## Tasks".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_key: default_vault_key(),
            task_folder: default_task_folder(),
            note_folder: default_note_folder(),
            daily_note_enabled: true,
            daily_note_folder: default_daily_note_folder(),
            daily_note_format: default_daily_note_format(),
            daily_note_section: default_daily_note_section(),
            daily_note_template: String::new(),
            daily_note_all_tasks: true,
        }
    }
}

impl Config {
    /// Load configuration, walking the discovery chain. An explicit path
    /// (argument or env var) must exist; discovered locations may not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::from_file(Path::new(&path));
        }
        for candidate in Self::discovery_paths() {
            if candidate.exists() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    fn discovery_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(PROJECT_CONFIG_FILE)];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".vault-tasks-sync").join("config.yaml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            SyncError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        serde_yaml::from_str(&text).map_err(|err| {
            SyncError::Config(format!("invalid config {}: {}", path.display(), err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = Config::default();
        assert_eq!(config.vault_key, "vault");
        assert_eq!(config.task_folder, "tasks");
        assert_eq!(config.daily_note_format, "YYYY-MM-DD");
        assert_eq!(config.daily_note_section, "## Tasks");
        assert!(config.daily_note_enabled);
        assert!(config.daily_note_all_tasks);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let config: Config =
            serde_yaml::from_str("task_folder: Work/Tasks\ndaily_note_all_tasks: false\n")
                .unwrap();
        assert_eq!(config.task_folder, "Work/Tasks");
        assert!(!config.daily_note_all_tasks);
        assert_eq!(config.daily_note_section, "## Tasks");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::from_file(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
