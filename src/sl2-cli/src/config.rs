//! CLI configuration stored as TOML in the platform config directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to the item catalog JSON (used when --items is not given)
    pub items_catalog: Option<PathBuf>,

    /// Path to the entity catalog JSON (used when --entities is not given)
    pub entity_catalog: Option<PathBuf>,

    /// Snapshot the save before destructive edits (default on)
    pub auto_backup: Option<bool>,
}

impl Config {
    fn path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join("sl2").join("config.toml"))
    }

    pub fn load() -> Result<Config> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn auto_backup(&self) -> bool {
        self.auto_backup.unwrap_or(true)
    }
}
