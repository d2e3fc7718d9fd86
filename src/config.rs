//! Project configuration stored in `.dayledger/config.yaml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const CONFIG_FILE: &str = "config.yaml";

/// When a template's `last_used` timestamp is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecencyPolicy {
    /// Only saving or updating a template bumps `last_used`.
    #[default]
    BumpOnSave,
    /// Loading a template into the working set also bumps `last_used`.
    BumpOnSaveAndLoad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How long a deleted row can be restored.
    pub undo_window_ms: u64,
    /// Attempts before a conflicting ledger merge gives up.
    pub merge_max_attempts: u32,
    pub recency_policy: RecencyPolicy,
    /// Glasses per day that earn the `water` tag.
    pub water_goal: u32,
    /// Fallback tracing filter when `DAYLEDGER_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            undo_window_ms: 5_000,
            merge_max_attempts: 5,
            recency_policy: RecencyPolicy::default(),
            water_goal: 8,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load the config from a project directory, falling back to defaults
    /// when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    /// Write the config into a project directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(dir.join(CONFIG_FILE), yaml)?;
        Ok(())
    }

    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.undo_window(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILE),
            "merge_max_attempts: 9\nrecency_policy: bump_on_save_and_load\n",
        )
        .unwrap();

        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.merge_max_attempts, 9);
        assert_eq!(config.recency_policy, RecencyPolicy::BumpOnSaveAndLoad);
        assert_eq!(config.water_goal, 8);
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            water_goal: 10,
            ..Config::default()
        };
        config.save(tmp.path()).unwrap();
        assert_eq!(Config::load(tmp.path()).unwrap().water_goal, 10);
    }
}
