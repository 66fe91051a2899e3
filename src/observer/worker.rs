//! Single consumer of the update queue. The only caller of the battery reader.

use std::sync::Arc;

use super::ports::{ActivityGuard, SensorDirectory, SensorUpdate};
use super::queue::{UpdateReceiver, UpdateRequest};
use super::reader::BatteryReader;
use super::state::{EventBus, ObserverEvent, ReadOutcome};

pub struct SerialWorker {
    directory: Arc<dyn SensorDirectory>,
    guard: Arc<dyn ActivityGuard>,
    reader: BatteryReader,
    events: EventBus,
}

impl SerialWorker {
    pub fn new(
        directory: Arc<dyn SensorDirectory>,
        guard: Arc<dyn ActivityGuard>,
        reader: BatteryReader,
        events: EventBus,
    ) -> Self {
        Self {
            directory,
            guard,
            reader,
            events,
        }
    }

    /// Consume requests one at a time until every producer is gone
    pub async fn run(self, mut queue: UpdateReceiver) {
        tracing::info!("Battery update worker started");
        while let Some(request) = queue.next().await {
            tracing::debug!(
                "Processing battery update for {} ({} pending)",
                request.sensor_id,
                queue.len()
            );
            self.process(request).await;
            if queue.is_empty() {
                tracing::debug!("Battery update queue drained");
            }
        }
        tracing::info!("Battery update worker stopped, queue closed");
    }

    pub async fn process(&self, request: UpdateRequest) {
        let UpdateRequest { sensor_id } = request;

        let sensor = match self.directory.get_by_id(&sensor_id).await {
            Ok(sensor) => sensor,
            Err(e) => {
                tracing::debug!("Dropping battery update for {}: {}", sensor_id, e);
                return;
            }
        };

        // Busy sensors are skipped, not requeued. The next poll tick asks again.
        if self.guard.is_busy(&sensor_id) {
            tracing::debug!("Sensor {} is downloading, skipping battery update", sensor_id);
            return;
        }

        self.events.publish(ObserverEvent::UpdateStarted {
            sensor_id: sensor_id.clone(),
        });

        let outcome = self.reader.read(&sensor.mac_address).await;

        if let ReadOutcome::Success { battery_level, .. } = &outcome {
            let update = SensorUpdate::BatteryLevel(*battery_level);
            if let Err(e) = self.directory.update(&sensor_id, update).await {
                tracing::warn!(
                    "Failed to store {} for sensor {}: {}",
                    update.field(),
                    sensor_id,
                    e
                );
            }
        }

        self.events.publish(outcome.into_event());
        self.events
            .publish(ObserverEvent::UpdateCompleted { sensor_id });
    }
}
