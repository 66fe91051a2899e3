//! Bounded-retry battery read for a single device

use std::sync::Arc;

use super::ports::DeviceService;
use super::state::ReadOutcome;

/// Attempts handed to the device service per read
pub const DEFAULT_INFO_RETRIES: u32 = 2;

const NULL_LEVEL_REASON: &str = "battery Level null";
const NO_MESSAGE_REASON: &str = "fail: no message";

#[derive(Clone)]
pub struct BatteryReader {
    device: Arc<dyn DeviceService>,
    max_retries: u32,
}

impl BatteryReader {
    pub fn new(device: Arc<dyn DeviceService>, max_retries: u32) -> Self {
        Self {
            device,
            max_retries,
        }
    }

    /// Read once through the device service. Never fails; errors become `Failure`.
    pub async fn read(&self, mac_address: &str) -> ReadOutcome {
        let mac_address = mac_address.to_string();

        match self
            .device
            .get_info_with_retries(&mac_address, self.max_retries)
            .await
        {
            Ok(info) => match info.battery_level {
                Some(battery_level) => {
                    tracing::info!("Battery {} {}%", mac_address, battery_level);
                    ReadOutcome::Success {
                        mac_address,
                        battery_level,
                    }
                }
                None => ReadOutcome::Failure {
                    mac_address,
                    reason: NULL_LEVEL_REASON.to_string(),
                },
            },
            Err(e) => {
                tracing::warn!("Battery read for {} failed: {}", mac_address, e);
                ReadOutcome::Failure {
                    mac_address,
                    reason: failure_reason(&e),
                }
            }
        }
    }
}

fn failure_reason(err: &dyn std::error::Error) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        NO_MESSAGE_REASON.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::ports::{DeviceError, DeviceInfo};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedDevice {
        result: Mutex<Option<Result<DeviceInfo, DeviceError>>>,
        retries_seen: Mutex<Vec<u32>>,
    }

    impl FixedDevice {
        fn new(result: Result<DeviceInfo, DeviceError>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                retries_seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DeviceService for FixedDevice {
        async fn get_info_with_retries(
            &self,
            _mac_address: &str,
            max_retries: u32,
        ) -> Result<DeviceInfo, DeviceError> {
            self.retries_seen.lock().unwrap().push(max_retries);
            self.result.lock().unwrap().take().expect("called once")
        }
    }

    #[tokio::test]
    async fn test_level_present_is_success() {
        let device = FixedDevice::new(Ok(DeviceInfo {
            battery_level: Some(87),
        }));
        let reader = BatteryReader::new(device.clone(), DEFAULT_INFO_RETRIES);

        assert_eq!(
            reader.read("AA:BB:CC").await,
            ReadOutcome::Success {
                mac_address: "AA:BB:CC".into(),
                battery_level: 87,
            }
        );
        assert_eq!(*device.retries_seen.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_null_level_is_failure() {
        let device = FixedDevice::new(Ok(DeviceInfo { battery_level: None }));
        let reader = BatteryReader::new(device, DEFAULT_INFO_RETRIES);

        assert_eq!(
            reader.read("AA:BB:CC").await,
            ReadOutcome::Failure {
                mac_address: "AA:BB:CC".into(),
                reason: "battery Level null".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_error_message_is_reason() {
        let device = FixedDevice::new(Err(DeviceError::NotFound("AA:BB:CC".into())));
        let reader = BatteryReader::new(device, DEFAULT_INFO_RETRIES);

        assert_eq!(
            reader.read("AA:BB:CC").await,
            ReadOutcome::Failure {
                mac_address: "AA:BB:CC".into(),
                reason: "device AA:BB:CC not found".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_error_without_message() {
        let device = FixedDevice::new(Err(DeviceError::Transport(String::new())));
        let reader = BatteryReader::new(device, DEFAULT_INFO_RETRIES);

        assert_eq!(
            reader.read("AA:BB:CC").await,
            ReadOutcome::Failure {
                mac_address: "AA:BB:CC".into(),
                reason: "fail: no message".into(),
            }
        );
    }
}
