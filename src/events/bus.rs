//! Broadcast bus carrying chart events to subscribers

use super::{ChartEvent, EventEmitter};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast channel capacity
const DEFAULT_CAPACITY: usize = 1024;

/// Distributes [`ChartEvent`]s via `tokio::sync::broadcast`.
///
/// Sending never blocks. With no subscriber connected the event is dropped;
/// a subscriber that falls more than the capacity behind sees `Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChartEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events (notification senders, UI bridges)
    pub fn subscribe(&self) -> broadcast::Receiver<ChartEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventEmitter for EventBus {
    fn emit(&self, event: ChartEvent) {
        let operation = event.operation();
        let chart_id = event.chart_id();
        match self.sender.send(event) {
            Ok(n) => debug!(%operation, %chart_id, subscribers = n, "Chart event sent"),
            Err(_) => debug!(%operation, %chart_id, "No subscribers; chart event dropped"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
