//! Bounded log of recent observer events

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};

use super::state::ObserverEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ObserverEvent,
}

#[derive(Debug, Clone)]
pub struct EventHistory {
    capacity: usize,
    entries: Arc<Mutex<VecDeque<RecordedEvent>>>,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn record(&self, event: ObserverEvent) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(RecordedEvent {
            at: Utc::now(),
            event,
        });
    }

    /// Newest last, at most `limit` entries
    pub fn recent(&self, limit: usize) -> Vec<RecordedEvent> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Record everything from `rx` until the bus goes away
    pub async fn follow(self, mut rx: broadcast::Receiver<ObserverEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.record(event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Event history fell behind, {} events missed", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
