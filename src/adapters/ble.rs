//! Battery reads over BLE (GATT Battery Service)

use async_trait::async_trait;
use btleplug::api::{bleuuid::uuid_from_u16, Central, Manager as BtManager, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager as BluetoothManager, Peripheral};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::observer::{DeviceError, DeviceInfo, DeviceService};

/// Battery Level characteristic (0x2A19), one byte, percent
const BATTERY_LEVEL_CHARACTERISTIC: u16 = 0x2A19;

const SCAN_POLL: Duration = Duration::from_millis(250);

// === Helper Functions ===

fn transport(e: btleplug::Error) -> DeviceError {
    DeviceError::Transport(e.to_string())
}

/// Cleanup steps never change the read result; failures are only logged.
/// Returns whether the step failed.
fn cleanup(step: &str, mac_address: &str, result: Result<(), btleplug::Error>) -> bool {
    match result {
        Ok(()) => false,
        Err(e) => {
            tracing::debug!("{} for {} failed: {}", step, mac_address, e);
            true
        }
    }
}

async fn first_adapter() -> Result<Adapter, DeviceError> {
    let manager = BluetoothManager::new().await.map_err(transport)?;
    manager
        .adapters()
        .await
        .map_err(transport)?
        .into_iter()
        .next()
        .ok_or(DeviceError::NoAdapter)
}

async fn known_peripheral(
    adapter: &Adapter,
    mac_address: &str,
) -> Result<Option<Peripheral>, DeviceError> {
    Ok(adapter
        .peripherals()
        .await
        .map_err(transport)?
        .into_iter()
        .find(|p| p.address().to_string().eq_ignore_ascii_case(mac_address)))
}

async fn read_battery_level(peripheral: &Peripheral) -> Result<DeviceInfo, DeviceError> {
    peripheral.discover_services().await.map_err(transport)?;

    let battery_uuid = uuid_from_u16(BATTERY_LEVEL_CHARACTERISTIC);
    let Some(characteristic) = peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == battery_uuid)
    else {
        return Ok(DeviceInfo::default());
    };

    let value = peripheral.read(&characteristic).await.map_err(transport)?;
    Ok(DeviceInfo {
        battery_level: value.first().copied(),
    })
}

/// Run `attempt` up to `attempts` times until it yields a battery level.
///
/// Ends with the last result: an error, or a read without a level.
async fn with_retries<F, Fut>(
    mac_address: &str,
    attempts: u32,
    delay: Duration,
    mut attempt: F,
) -> Result<DeviceInfo, DeviceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<DeviceInfo, DeviceError>>,
{
    let attempts = attempts.max(1);
    let mut last = Ok(DeviceInfo::default());

    for n in 1..=attempts {
        last = attempt().await;
        match &last {
            Ok(info) if info.battery_level.is_some() => return last,
            Ok(_) => tracing::debug!("{}: no battery level (attempt {}/{})", mac_address, n, attempts),
            Err(e) => tracing::debug!("{}: {} (attempt {}/{})", mac_address, e, n, attempts),
        }
        if n < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    last
}

// === Service ===

pub struct BleDeviceService {
    scan_timeout: Duration,
    retry_delay: Duration,
}

impl BleDeviceService {
    pub fn new(scan_timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            scan_timeout,
            retry_delay,
        }
    }

    async fn find_peripheral(
        &self,
        adapter: &Adapter,
        mac_address: &str,
    ) -> Result<Peripheral, DeviceError> {
        if let Some(peripheral) = known_peripheral(adapter, mac_address).await? {
            return Ok(peripheral);
        }

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(transport)?;
        let deadline = Instant::now() + self.scan_timeout;
        let found = loop {
            tokio::time::sleep(SCAN_POLL).await;
            match known_peripheral(adapter, mac_address).await {
                Ok(Some(peripheral)) => break Ok(Some(peripheral)),
                Ok(None) if Instant::now() < deadline => continue,
                other => break other,
            }
        };
        cleanup("stop scan", mac_address, adapter.stop_scan().await);

        found?.ok_or_else(|| DeviceError::NotFound(mac_address.to_string()))
    }

    async fn read_once(&self, mac_address: &str) -> Result<DeviceInfo, DeviceError> {
        let adapter = first_adapter().await?;
        let peripheral = self.find_peripheral(&adapter, mac_address).await?;

        if !peripheral.is_connected().await.map_err(transport)? {
            peripheral.connect().await.map_err(transport)?;
        }

        let result = read_battery_level(&peripheral).await;

        cleanup("disconnect", mac_address, peripheral.disconnect().await);
        result
    }
}

#[async_trait]
impl DeviceService for BleDeviceService {
    async fn get_info_with_retries(
        &self,
        mac_address: &str,
        max_retries: u32,
    ) -> Result<DeviceInfo, DeviceError> {
        with_retries(mac_address, max_retries, self.retry_delay, || {
            self.read_once(mac_address)
        })
        .await
    }
}
