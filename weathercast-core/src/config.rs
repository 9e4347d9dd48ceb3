use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::service::DEFAULT_THUNDER_MARKER;

/// A named forecast source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    pub url: String,
}

/// Opening hours reported by the gate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateHours {
    pub open: String,
    pub close: String,
}

impl Default for GateHours {
    fn default() -> Self {
        Self {
            open: "08:00".to_string(),
            close: "16:00".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address for the REST/WebSocket server.
    pub bind: String,

    /// Seconds between WebSocket pushes.
    pub broadcast_interval_secs: u64,

    /// Basic-weather page (JS-variable payload).
    pub basic_url: String,

    /// Referer header sent to upstream providers; empty sends none.
    pub referer: String,

    /// Alert-title substring that marks a thunderstorm.
    pub thunder_marker: String,

    pub gate: GateHours,

    /// Example TOML:
    /// [locations.TAISHAN]
    /// url = "https://..."
    pub locations: BTreeMap<String, LocationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            broadcast_interval_secs: 5,
            basic_url: "https://d1.weather.com.cn/sk_2d/101120801.html".to_string(),
            referer: "https://www.weather.com.cn/".to_string(),
            thunder_marker: DEFAULT_THUNDER_MARKER.to_string(),
            gate: GateHours::default(),
            locations: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weathercast", "weathercast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace the URL for a named location.
    pub fn upsert_location(&mut self, name: &str, url: String) {
        self.locations
            .insert(name.to_string(), LocationConfig { url });
    }

    pub fn location_url(&self, name: &str) -> Option<&str> {
        self.locations.get(name).map(|l| l.url.as_str())
    }

    pub fn location_names(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    /// The Referer to send, or `None` when cleared.
    pub fn referer_header(&self) -> Option<&str> {
        Some(self.referer.trim()).filter(|r| !r.is_empty())
    }
}
