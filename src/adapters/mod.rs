//! Adapters - concrete collaborators plugged into the observer core

#[cfg(feature = "ble")]
pub mod ble;
pub mod directory;
pub mod downloads;

use std::sync::Arc;
use std::time::Duration;

use crate::observer::DeviceService;
#[cfg(not(feature = "ble"))]
use crate::observer::{DeviceError, DeviceInfo};
#[cfg(not(feature = "ble"))]
use async_trait::async_trait;

/// Device service for builds without BLE support. Every read fails.
#[cfg(not(feature = "ble"))]
pub struct NoBluetooth;

#[cfg(not(feature = "ble"))]
#[async_trait]
impl DeviceService for NoBluetooth {
    async fn get_info_with_retries(
        &self,
        _mac_address: &str,
        _max_retries: u32,
    ) -> Result<DeviceInfo, DeviceError> {
        Err(DeviceError::Unsupported)
    }
}

/// The device service this build talks to
pub fn device_service(scan_timeout: Duration, retry_delay: Duration) -> Arc<dyn DeviceService> {
    #[cfg(feature = "ble")]
    {
        Arc::new(ble::BleDeviceService::new(scan_timeout, retry_delay))
    }
    #[cfg(not(feature = "ble"))]
    {
        let _ = (scan_timeout, retry_delay);
        Arc::new(NoBluetooth)
    }
}
