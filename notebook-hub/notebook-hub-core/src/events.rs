use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// A committed change to the notebook store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    Created { identifier: String },
    Updated { identifier: String },
    ContentSet { identifier: String },
}

impl StoreEvent {
    pub fn identifier(&self) -> &str {
        match self {
            StoreEvent::Created { identifier }
            | StoreEvent::Updated { identifier }
            | StoreEvent::ContentSet { identifier } => identifier,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Log every committed store change until the bus is dropped.
pub async fn log_events(mut rx: broadcast::Receiver<StoreEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => debug!("store change for {}: {:?}", event.identifier(), event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("store event log fell behind, {} events skipped", skipped)
            }
            Err(RecvError::Closed) => break,
        }
    }
}
