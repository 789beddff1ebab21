//! Configuration system for Fragscope

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub defrag: DefragConfig,
    pub display: DisplayConfig,
    pub map: MapConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fragscope").join("config.toml"))
    }
}

/// External programs the tasks invoke
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Privilege helper; ignored when already running as root
    pub elevate: String,
    pub analyzer: String,
    pub check_flag: String,
    pub defragmenter: String,
    pub lister: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            elevate: "pkexec".to_string(),
            analyzer: "e4defrag".to_string(),
            check_flag: "-c".to_string(),
            defragmenter: "e4defrag".to_string(),
            lister: "lsblk".to_string(),
        }
    }
}

/// Synthetic progress ramp shown while e4defrag runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DefragConfig {
    pub progress_interval_ms: u64,
    pub progress_initial: u8,
    pub progress_step: u8,
    pub progress_ceiling: u8,
}

impl DefragConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(10))
    }
}

impl Default for DefragConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 500,
            progress_initial: 5,
            progress_step: 3,
            progress_ceiling: 95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub theme: String,
    /// Surface units per map cell edge; a terminal cell is 1 wide, 2 tall
    pub cell_edge: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: "tokyo-night".to_string(),
            cell_edge: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    /// Fixed seed for map layout; random per run when absent
    pub seed: Option<u64>,
}

/// Write the default configuration file
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    Config::default().save(path)?;
    println!("Created {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[tools]\nelevate = \"sudo\"\n\n[map]\nseed = 7\n",
        )
        .expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.tools.elevate, "sudo");
        assert_eq!(config.tools.analyzer, "e4defrag");
        assert_eq!(config.map.seed, Some(7));
        assert_eq!(config.defrag, DefragConfig::default());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        init_config(&path, false).expect("first init");
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).expect("forced init");

        assert_eq!(Config::load(&path).expect("reload"), Config::default());
    }

    #[test]
    fn interval_has_a_floor() {
        let config = DefragConfig {
            progress_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.interval(), Duration::from_millis(10));
    }
}
