use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use devdash_terminal::{SubsystemTable, TimingConfig};

pub const CONFIG_FILE_NAME: &str = "config.toml";

fn default_tmux_binary() -> String {
    "tmux".to_string()
}

fn default_journal() -> bool {
    true
}

/// Dashboard settings read by the session manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_tmux_binary")]
    pub tmux_binary: String,

    /// Append lifecycle events to sessions.jsonl
    #[serde(default = "default_journal")]
    pub journal: bool,

    #[serde(default)]
    pub timings: TimingConfig,

    #[serde(default)]
    pub subsystems: SubsystemTable,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            tmux_binary: default_tmux_binary(),
            journal: default_journal(),
            timings: TimingConfig::default(),
            subsystems: SubsystemTable::default(),
        }
    }
}

impl DashboardConfig {
    /// Load config from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: DashboardConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the config, writing a default file first if none exists
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from_file(path);
        }

        let config = DashboardConfig::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save_to_file(path)?;
        log::info!("Created default config file: {}", path.display());
        Ok(config)
    }
}

/// `--config` if given, otherwise ~/.devdash/config.toml
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(devdash_logging::get_devdash_dir()?.join(CONFIG_FILE_NAME)),
    }
}
