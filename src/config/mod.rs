use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub recording: RecordingConfig,
    pub badge: BadgeConfig,
    pub connector: ConnectorConfig,
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// How often the content script re-checks the page URL.
    pub poll_interval_ms: u64,
    /// Delay after a client-side navigation before re-checking.
    pub url_settle_ms: u64,
    /// Delay between attempts to find the participant container.
    pub observer_retry_ms: u64,
    /// Host name a meeting URL must contain.
    pub meeting_host: String,
}

impl DetectionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn url_settle(&self) -> Duration {
        Duration::from_millis(self.url_settle_ms)
    }

    pub fn observer_retry(&self) -> Duration {
        Duration::from_millis(self.observer_retry_ms.max(1))
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            url_settle_ms: 1000,
            observer_retry_ms: 2000,
            meeting_host: "meet.google.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub mime_type: String,
    /// Chunk collection interval handed to the capture device.
    pub timeslice_ms: u64,
}

impl RecordingConfig {
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms.max(1))
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mime_type: "audio/webm".to_string(),
            timeslice_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    pub meeting_text: String,
    pub meeting_color: String,
    pub recording_text: String,
    pub recording_color: String,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            meeting_text: "ON".to_string(),
            meeting_color: "#4CAF50".to_string(),
            recording_text: "REC".to_string(),
            recording_color: "#F44336".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    pub extension_id: String,
    pub port_name: String,
    /// Pages allowed to connect; `scheme://*.domain` matches any subdomain.
    pub allowed_origins: Vec<String>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            extension_id: "meet-enhancer".to_string(),
            port_name: "meet-enhancer-app".to_string(),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "https://*.tempo.new".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Queue depth in front of the coordinator.
    pub coordinator_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            coordinator_capacity: 64,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
