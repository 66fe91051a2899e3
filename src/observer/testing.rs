//! Collaborator stubs shared by the observer tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ports::{
    DeviceError, DeviceInfo, DeviceService, DirectoryError, Sensor, SensorDirectory, SensorUpdate,
};
use super::state::{ObserverState, StateSnapshot};

// === Directory ===

#[derive(Default)]
pub struct StubDirectory {
    pub sensors: Mutex<Vec<Sensor>>,
    pub fail_get_all: AtomicBool,
    pub get_all_calls: AtomicUsize,
    pub get_all_latency: Mutex<Duration>,
    get_all_active: AtomicUsize,
    pub max_concurrent_get_all: AtomicUsize,
    pub updates: Mutex<Vec<(String, SensorUpdate)>>,
}

impl StubDirectory {
    pub fn with_sensors(sensors: &[(&str, &str)]) -> Arc<Self> {
        let directory = Self::default();
        *directory.sensors.lock().unwrap() = sensors
            .iter()
            .map(|(id, mac)| Sensor::new(*id, *mac))
            .collect();
        Arc::new(directory)
    }

    pub fn updates(&self) -> Vec<(String, SensorUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl SensorDirectory for StubDirectory {
    async fn get_all(&self) -> Result<Vec<Sensor>, DirectoryError> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.get_all_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_get_all.fetch_max(active, Ordering::SeqCst);
        let latency = *self.get_all_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.get_all_active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_get_all.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("stub offline".into()));
        }
        Ok(self.sensors.lock().unwrap().clone())
    }

    async fn get_by_id(&self, sensor_id: &str) -> Result<Sensor, DirectoryError> {
        self.sensors
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == sensor_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(sensor_id.to_string()))
    }

    async fn update(&self, sensor_id: &str, update: SensorUpdate) -> Result<(), DirectoryError> {
        self.updates
            .lock()
            .unwrap()
            .push((sensor_id.to_string(), update));
        Ok(())
    }
}

// === Device ===

/// Panics if a read starts while another is unresolved.
pub struct ScriptedDevice {
    results: Mutex<HashMap<String, Result<DeviceInfo, DeviceError>>>,
    latency: Duration,
    in_flight: AtomicBool,
    pub calls: Mutex<Vec<String>>,
    watched_state: Mutex<Option<Arc<ObserverState>>>,
    pub snapshots: Mutex<Vec<StateSnapshot>>,
}

impl ScriptedDevice {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(HashMap::new()),
            latency,
            in_flight: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            watched_state: Mutex::new(None),
            snapshots: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, mac_address: &str, result: Result<DeviceInfo, DeviceError>) {
        self.results
            .lock()
            .unwrap()
            .insert(mac_address.to_string(), result);
    }

    /// Record a state snapshot at the start of every read
    pub fn watch_state(&self, state: Arc<ObserverState>) {
        *self.watched_state.lock().unwrap() = Some(state);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceService for ScriptedDevice {
    async fn get_info_with_retries(
        &self,
        mac_address: &str,
        _max_retries: u32,
    ) -> Result<DeviceInfo, DeviceError> {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "battery read for {} started while another read was in flight",
            mac_address
        );
        self.calls.lock().unwrap().push(mac_address.to_string());
        if let Some(state) = self.watched_state.lock().unwrap().as_ref() {
            self.snapshots.lock().unwrap().push(state.snapshot());
        }

        tokio::time::sleep(self.latency).await;

        let result = self
            .results
            .lock()
            .unwrap()
            .remove(mac_address)
            .unwrap_or(Ok(DeviceInfo {
                battery_level: Some(50),
            }));
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}
