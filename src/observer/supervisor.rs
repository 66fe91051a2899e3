//! Start/stop control of battery polling

use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::queue::{QueueError, UpdateRequest, UpdateSender};
use super::scheduler::PollScheduler;
use super::state::{EventBus, ObserverEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyWatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotWatching,
}

enum Phase {
    /// `last_cycle` is the stopped cycle, possibly still finishing a fetch
    Idle { last_cycle: Option<JoinHandle<()>> },
    Watching {
        cancel: CancellationToken,
        cycle: JoinHandle<()>,
    },
}

pub struct Supervisor {
    phase: Mutex<Phase>,
    scheduler: PollScheduler,
    queue: UpdateSender,
    events: EventBus,
}

impl Supervisor {
    pub fn new(scheduler: PollScheduler, queue: UpdateSender, events: EventBus) -> Self {
        Self {
            phase: Mutex::new(Phase::Idle { last_cycle: None }),
            scheduler,
            queue,
            events,
        }
    }

    /// Idle -> Watching. Ignored while already watching.
    ///
    /// A new cycle waits for the previous one to exit before its first tick,
    /// so two cycles never run at once. Must be called from within a tokio
    /// runtime.
    pub fn start(&self) -> StartOutcome {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        let last_cycle = match &mut *phase {
            Phase::Watching { .. } => {
                tracing::debug!("Start ignored, battery polling already active");
                return StartOutcome::AlreadyWatching;
            }
            Phase::Idle { last_cycle } => last_cycle.take(),
        };

        let cancel = CancellationToken::new();
        let scheduler = self.scheduler.clone();
        let token = cancel.clone();
        let cycle = tokio::spawn(async move {
            if let Some(previous) = last_cycle {
                if let Err(e) = previous.await {
                    tracing::warn!("Previous polling cycle ended abnormally: {}", e);
                }
            }
            scheduler.run(token).await;
        });

        *phase = Phase::Watching { cancel, cycle };
        self.events.publish(ObserverEvent::WatchingStarted);
        StartOutcome::Started
    }

    /// Watching -> Idle. The cycle exits before its next fetch; queued
    /// requests are kept.
    pub fn stop(&self) -> StopOutcome {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        match std::mem::replace(&mut *phase, Phase::Idle { last_cycle: None }) {
            Phase::Watching { cancel, cycle } => {
                cancel.cancel();
                *phase = Phase::Idle {
                    last_cycle: Some(cycle),
                };
                self.events.publish(ObserverEvent::WatchingStopped);
                StopOutcome::Stopped
            }
            idle => {
                *phase = idle;
                StopOutcome::NotWatching
            }
        }
    }

    pub fn request_update(&self, sensor_id: impl Into<String>) -> Result<(), QueueError> {
        self.queue.enqueue(UpdateRequest::new(sensor_id))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        self.scheduler.interval()
    }
}
