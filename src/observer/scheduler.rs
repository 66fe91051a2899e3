//! Periodic fan-out of battery update requests

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::ports::SensorDirectory;
use super::queue::{UpdateRequest, UpdateSender};

/// Ten minutes between poll ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Clone)]
pub struct PollScheduler {
    directory: Arc<dyn SensorDirectory>,
    queue: UpdateSender,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(directory: Arc<dyn SensorDirectory>, queue: UpdateSender, interval: Duration) -> Self {
        Self {
            directory,
            queue,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick, sleep, repeat. Cancellation is observed before every fetch and
    /// while sleeping; a fetch already under way completes.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            "Battery polling started, every {}s",
            self.interval.as_secs()
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.enqueue_all_sensors().await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("Battery polling stopped");
    }

    /// Enqueue one request per known sensor, in directory order.
    ///
    /// A directory failure abandons the tick and enqueues nothing.
    pub async fn enqueue_all_sensors(&self) -> usize {
        let sensors = match self.directory.get_all().await {
            Ok(sensors) => sensors,
            Err(e) => {
                tracing::debug!("Skipping battery poll tick: {}", e);
                return 0;
            }
        };

        let mut enqueued = 0;
        for sensor in sensors {
            match self.queue.enqueue(UpdateRequest::new(sensor.id)) {
                Ok(()) => enqueued += 1,
                Err(e) => tracing::warn!("{}", e),
            }
        }
        tracing::debug!("Poll tick enqueued {} battery updates", enqueued);
        enqueued
    }
}
