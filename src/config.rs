use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// User configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// tmux prefix key for the session; empty until the first run asks
    pub prefix: String,
    /// Command typed into every new window
    pub agent_command: String,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Width of the dashboard side pane in columns
    pub width: u16,
    /// Seconds between refreshes
    pub refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            agent_command: "claude".to_string(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            width: 20,
            refresh_secs: 2,
        }
    }
}

impl Config {
    /// Default location: ~/.config/agentq/config.json
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".config")
            .join("agentq")
            .join("config.json")
    }

    /// Load the config, falling back to defaults when the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };

        let mut config: Config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.fill_defaults();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Replace explicit zero/empty values that would break the session
    fn fill_defaults(&mut self) {
        let defaults = Self::default();
        if self.agent_command.trim().is_empty() {
            self.agent_command = defaults.agent_command;
        }
        if self.dashboard.width == 0 {
            self.dashboard.width = defaults.dashboard.width;
        }
        if self.dashboard.refresh_secs == 0 {
            self.dashboard.refresh_secs = defaults.dashboard.refresh_secs;
        }
    }
}
