//! Configuration module for the battery observer
//!
//! Reads/writes configuration from ~/.config/battery-observer/config.toml

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::observer::{ObserverOptions, DEFAULT_INFO_RETRIES};

/// A sensor the observer should keep fresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub id: String,
    pub mac_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Observer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between poll ticks
    pub poll_interval_secs: u64,
    /// Attempts per battery read
    pub info_retries: u32,
    /// Pause between attempts
    pub retry_delay_ms: u64,
    /// How long to scan for a device that is not yet known to the adapter
    pub scan_timeout_secs: u64,
    /// Start polling as soon as the server starts
    pub watch_on_startup: bool,
    /// Events kept for get_recent_events
    pub event_history: usize,
    /// Broadcast buffer for event subscribers
    pub event_buffer: usize,
    pub sensors: Vec<SensorEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_secs: 600,
            info_retries: DEFAULT_INFO_RETRIES,
            retry_delay_ms: 500,
            scan_timeout_secs: 5,
            watch_on_startup: true,
            event_history: 100,
            event_buffer: 64,
            sensors: Vec::new(),
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("battery-observer").join("config.toml"))
    }

    /// Load config from file, or return default if it is missing or unreadable
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Self::default();
        };

        match Self::read_from(&path) {
            Ok(Some(config)) => {
                tracing::info!("Loaded config from {:?}: {} sensors", path, config.sensors.len());
                config
            }
            Ok(None) => {
                tracing::info!("No config file found at {:?}, using defaults (no sensors)", path);
                Self::default()
            }
            Err(e) => {
                tracing::error!("Ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    /// Read and parse a config file. `None` when the file does not exist.
    pub fn read_from(path: &Path) -> anyhow::Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let config = Self::parse(&contents).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(config))
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Write the config back, creating its directory on first save
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        fs::write(&path, toml::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            poll_interval: self.poll_interval(),
            info_retries: self.info_retries,
            event_buffer: self.event_buffer,
            event_history: self.event_history,
        }
    }
}
