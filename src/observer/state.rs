//! Observer state, events and the bus that applies one to the other

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

// === Events ===

/// Everything the observer core publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverEvent {
    WatchingStarted,
    WatchingStopped,
    UpdateStarted { sensor_id: String },
    UpdateCompleted { sensor_id: String },
    UpdateSucceeded { mac_address: String, battery_level: u8 },
    UpdateFailed { mac_address: String, reason: String },
}

/// Result of one battery read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Success { mac_address: String, battery_level: u8 },
    Failure { mac_address: String, reason: String },
}

impl ReadOutcome {
    pub fn into_event(self) -> ObserverEvent {
        match self {
            ReadOutcome::Success {
                mac_address,
                battery_level,
            } => ObserverEvent::UpdateSucceeded {
                mac_address,
                battery_level,
            },
            ReadOutcome::Failure {
                mac_address,
                reason,
            } => ObserverEvent::UpdateFailed {
                mac_address,
                reason,
            },
        }
    }
}

// === State ===

/// Point-in-time copy of the observer state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub is_watching: bool,
    pub updating_by_id: BTreeMap<String, bool>,
}

/// Process-wide observer state.
///
/// Only [`EventBus::publish`] mutates it. Everyone else reads.
#[derive(Debug, Default)]
pub struct ObserverState {
    inner: RwLock<StateSnapshot>,
}

impl ObserverState {
    pub fn snapshot(&self) -> StateSnapshot {
        self.read().clone()
    }

    pub fn is_watching(&self) -> bool {
        self.read().is_watching
    }

    pub fn is_updating(&self, sensor_id: &str) -> bool {
        self.read()
            .updating_by_id
            .get(sensor_id)
            .copied()
            .unwrap_or(false)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StateSnapshot> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, event: &ObserverEvent) {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match event {
            ObserverEvent::WatchingStarted => state.is_watching = true,
            ObserverEvent::WatchingStopped => state.is_watching = false,
            ObserverEvent::UpdateStarted { sensor_id } => {
                state.updating_by_id.insert(sensor_id.clone(), true);
            }
            ObserverEvent::UpdateCompleted { sensor_id } => {
                state.updating_by_id.insert(sensor_id.clone(), false);
            }
            ObserverEvent::UpdateSucceeded { .. } | ObserverEvent::UpdateFailed { .. } => {}
        }
    }
}

// === Bus ===

/// Applies events to the state, then broadcasts them
#[derive(Debug, Clone)]
pub struct EventBus {
    state: Arc<ObserverState>,
    tx: broadcast::Sender<ObserverEvent>,
    /// Every published event with the state right after applying it
    #[cfg(test)]
    journal: Arc<std::sync::Mutex<Vec<(ObserverEvent, StateSnapshot)>>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Arc::new(ObserverState::default()),
            tx,
            #[cfg(test)]
            journal: Arc::default(),
        }
    }

    pub fn state(&self) -> Arc<ObserverState> {
        Arc::clone(&self.state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ObserverEvent> {
        self.tx.subscribe()
    }

    pub(super) fn publish(&self, event: ObserverEvent) {
        self.state.apply(&event);
        #[cfg(test)]
        self.journal
            .lock()
            .unwrap()
            .push((event.clone(), self.state.snapshot()));
        tracing::trace!(?event, "observer event");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    #[cfg(test)]
    pub fn journal(&self) -> Vec<(ObserverEvent, StateSnapshot)> {
        self.journal.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_defaults_to_idle() {
        let bus = EventBus::new(8);
        let state = bus.state();
        assert!(!state.is_watching());
        assert!(!state.is_updating("s1"));
        assert!(state.snapshot().updating_by_id.is_empty());
    }

    #[test]
    fn test_events_drive_state() {
        let bus = EventBus::new(8);
        let state = bus.state();

        bus.publish(ObserverEvent::WatchingStarted);
        assert!(state.is_watching());

        bus.publish(ObserverEvent::UpdateStarted {
            sensor_id: "s1".into(),
        });
        assert!(state.is_updating("s1"));
        assert!(!state.is_updating("s2"));

        bus.publish(ObserverEvent::UpdateCompleted {
            sensor_id: "s1".into(),
        });
        assert!(!state.is_updating("s1"));
        assert_eq!(state.snapshot().updating_by_id.get("s1"), Some(&false));

        bus.publish(ObserverEvent::WatchingStopped);
        assert!(!state.is_watching());
    }

    #[tokio::test]
    async fn test_subscribers_see_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(ObserverEvent::UpdateFailed {
            mac_address: "AA:BB:CC".into(),
            reason: "battery Level null".into(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            ObserverEvent::UpdateFailed {
                mac_address: "AA:BB:CC".into(),
                reason: "battery Level null".into(),
            }
        );
    }

    #[test]
    fn test_outcome_maps_to_event() {
        let success = ReadOutcome::Success {
            mac_address: "AA:BB:CC".into(),
            battery_level: 87,
        };
        assert_eq!(
            success.into_event(),
            ObserverEvent::UpdateSucceeded {
                mac_address: "AA:BB:CC".into(),
                battery_level: 87,
            }
        );
    }
}
