//! Battery observer core
//!
//! Keeps sensor battery levels fresh without ever running two reads at once.
//!
//! - [`scheduler`]: periodic tick that enqueues one request per known sensor
//! - [`queue`]: unbounded FIFO of update requests
//! - [`worker`]: single consumer; gates on download activity and reads
//! - [`reader`]: bounded-retry read with a typed outcome
//! - [`supervisor`]: start/stop of polling, single-sensor refresh
//! - [`state`]: observer state, events and the bus between them

pub mod history;
pub mod ports;
pub mod queue;
pub mod reader;
pub mod scheduler;
pub mod state;
pub mod supervisor;
pub mod worker;

#[cfg(test)]
mod testing;

pub use history::EventHistory;
pub use ports::{
    ActivityGuard, DeviceError, DeviceInfo, DeviceService, DirectoryError, Sensor,
    SensorDirectory, SensorUpdate,
};
pub use reader::{BatteryReader, DEFAULT_INFO_RETRIES};
pub use state::{EventBus, ObserverState, ReadOutcome};
pub use supervisor::{StartOutcome, StopOutcome, Supervisor};

use queue::update_queue;
use scheduler::{PollScheduler, DEFAULT_POLL_INTERVAL};
use std::sync::Arc;
use std::time::Duration;
use worker::SerialWorker;

/// Tunables for [`Observer::spawn`]
#[derive(Debug, Clone)]
pub struct ObserverOptions {
    pub poll_interval: Duration,
    pub info_retries: u32,
    pub event_buffer: usize,
    pub event_history: usize,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            info_retries: DEFAULT_INFO_RETRIES,
            event_buffer: 64,
            event_history: 100,
        }
    }
}

/// A running observer: worker spawned, polling idle until started
pub struct Observer {
    pub supervisor: Supervisor,
    pub events: EventBus,
    pub history: EventHistory,
}

impl Observer {
    /// Wire the components and spawn the worker and history tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        directory: Arc<dyn SensorDirectory>,
        device: Arc<dyn DeviceService>,
        guard: Arc<dyn ActivityGuard>,
        options: ObserverOptions,
    ) -> Self {
        let events = EventBus::new(options.event_buffer);
        let history = EventHistory::new(options.event_history);
        tokio::spawn(history.clone().follow(events.subscribe()));

        let (tx, rx) = update_queue();
        let reader = BatteryReader::new(device, options.info_retries);
        let worker = SerialWorker::new(Arc::clone(&directory), guard, reader, events.clone());
        tokio::spawn(worker.run(rx));

        let scheduler = PollScheduler::new(directory, tx.clone(), options.poll_interval);
        let supervisor = Supervisor::new(scheduler, tx, events.clone());

        Self {
            supervisor,
            events,
            history,
        }
    }

    pub fn state(&self) -> Arc<ObserverState> {
        self.events.state()
    }
}
