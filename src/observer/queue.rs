//! Pending battery update requests

use tokio::sync::mpsc;

/// A request to refresh one sensor's battery level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub sensor_id: String,
}

impl UpdateRequest {
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("update queue closed, request for {0} dropped")]
    Closed(String),
}

/// Create an unbounded FIFO. Producers clone the sender, one worker owns the receiver.
pub fn update_queue() -> (UpdateSender, UpdateReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (UpdateSender { tx }, UpdateReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<UpdateRequest>,
}

impl UpdateSender {
    pub fn enqueue(&self, request: UpdateRequest) -> Result<(), QueueError> {
        self.tx
            .send(request)
            .map_err(|e| QueueError::Closed(e.0.sensor_id))
    }
}

#[derive(Debug)]
pub struct UpdateReceiver {
    rx: mpsc::UnboundedReceiver<UpdateRequest>,
}

impl UpdateReceiver {
    /// Next request, or `None` once every sender is gone and the queue is drained
    pub async fn next(&mut self) -> Option<UpdateRequest> {
        self.rx.recv().await
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
