//! Collaborator boundaries of the observer core
//!
//! The core never talks to storage, the radio or the download subsystem
//! directly. It only sees these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

// === Types ===

/// A tracked sensor as known to the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sensor {
    pub id: String,
    pub mac_address: String,
    pub name: Option<String>,
    pub battery_level: Option<u8>,
    pub battery_updated_at: Option<DateTime<Utc>>,
}

impl Sensor {
    pub fn new(id: impl Into<String>, mac_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            mac_address: mac_address.into(),
            name: None,
            battery_level: None,
            battery_updated_at: None,
        }
    }
}

/// A field write pushed back into the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorUpdate {
    BatteryLevel(u8),
}

impl SensorUpdate {
    /// Name of the field being written
    pub fn field(&self) -> &'static str {
        match self {
            SensorUpdate::BatteryLevel(_) => "batteryLevel",
        }
    }
}

/// What a device info query returned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub battery_level: Option<u8>,
}

// === Errors ===

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("sensor not found: {0}")]
    NotFound(String),
    #[error("sensor directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no bluetooth adapter available")]
    NoAdapter,
    #[error("device {0} not found")]
    NotFound(String),
    #[cfg_attr(feature = "ble", allow(dead_code))]
    #[error("bluetooth support not compiled in")]
    Unsupported,
    #[error("{0}")]
    Transport(String),
}

// === Ports ===

/// Registry of known sensors
#[async_trait]
pub trait SensorDirectory: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Sensor>, DirectoryError>;

    async fn get_by_id(&self, sensor_id: &str) -> Result<Sensor, DirectoryError>;

    async fn update(&self, sensor_id: &str, update: SensorUpdate) -> Result<(), DirectoryError>;
}

/// Device communication. Retry and backoff live behind this boundary.
#[async_trait]
pub trait DeviceService: Send + Sync {
    async fn get_info_with_retries(
        &self,
        mac_address: &str,
        max_retries: u32,
    ) -> Result<DeviceInfo, DeviceError>;
}

/// Answers whether a sensor is held by an exclusive activity (a data download)
pub trait ActivityGuard: Send + Sync {
    fn is_busy(&self, sensor_id: &str) -> bool;
}
