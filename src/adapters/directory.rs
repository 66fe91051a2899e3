//! In-memory sensor directory seeded from the config file

use async_trait::async_trait;
use chrono::Utc;
use std::sync::RwLock;

use crate::config::SensorEntry;
use crate::observer::{DirectoryError, Sensor, SensorDirectory, SensorUpdate};

#[derive(Debug, Default)]
pub struct ConfiguredDirectory {
    sensors: RwLock<Vec<Sensor>>,
}

impl ConfiguredDirectory {
    pub fn new(entries: &[SensorEntry]) -> Self {
        let sensors = entries
            .iter()
            .map(|entry| Sensor {
                name: entry.name.clone(),
                ..Sensor::new(entry.id.clone(), entry.mac_address.clone())
            })
            .collect();
        Self {
            sensors: RwLock::new(sensors),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Sensor>>, DirectoryError> {
        self.sensors
            .read()
            .map_err(|_| DirectoryError::Unavailable("sensor list lock poisoned".into()))
    }
}

#[async_trait]
impl SensorDirectory for ConfiguredDirectory {
    async fn get_all(&self) -> Result<Vec<Sensor>, DirectoryError> {
        Ok(self.read()?.clone())
    }

    async fn get_by_id(&self, sensor_id: &str) -> Result<Sensor, DirectoryError> {
        self.read()?
            .iter()
            .find(|s| s.id == sensor_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(sensor_id.to_string()))
    }

    async fn update(&self, sensor_id: &str, update: SensorUpdate) -> Result<(), DirectoryError> {
        let mut sensors = self
            .sensors
            .write()
            .map_err(|_| DirectoryError::Unavailable("sensor list lock poisoned".into()))?;
        let sensor = sensors
            .iter_mut()
            .find(|s| s.id == sensor_id)
            .ok_or_else(|| DirectoryError::NotFound(sensor_id.to_string()))?;

        match update {
            SensorUpdate::BatteryLevel(level) => {
                sensor.battery_level = Some(level);
                sensor.battery_updated_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<SensorEntry> {
        vec![
            SensorEntry {
                id: "fridge-1".into(),
                mac_address: "AA:BB:CC:DD:EE:01".into(),
                name: Some("Vaccine fridge".into()),
            },
            SensorEntry {
                id: "fridge-2".into(),
                mac_address: "AA:BB:CC:DD:EE:02".into(),
                name: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_lookup_in_config_order() {
        let directory = ConfiguredDirectory::new(&entries());

        let all = directory.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "fridge-1");
        assert_eq!(all[0].name.as_deref(), Some("Vaccine fridge"));

        let sensor = directory.get_by_id("fridge-2").await.unwrap();
        assert_eq!(sensor.mac_address, "AA:BB:CC:DD:EE:02");
        assert!(sensor.battery_level.is_none());

        assert!(matches!(
            directory.get_by_id("nope").await,
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_battery_update_is_recorded() {
        let directory = ConfiguredDirectory::new(&entries());

        directory
            .update("fridge-1", SensorUpdate::BatteryLevel(87))
            .await
            .unwrap();

        let sensor = directory.get_by_id("fridge-1").await.unwrap();
        assert_eq!(sensor.battery_level, Some(87));
        assert!(sensor.battery_updated_at.is_some());

        assert!(directory
            .update("nope", SensorUpdate::BatteryLevel(1))
            .await
            .is_err());
    }
}
