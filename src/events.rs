//! Lifecycle event stream
//!
//! Every record mutation is published as a full snapshot so observers (UI,
//! logging) never need to poll. Events for a single transaction arrive in
//! mutation order; nothing is buffered for late subscribers, and dropping a
//! receiver is how a subscriber unsubscribes.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::record::TxRecord;

/// A lifecycle event carrying the record snapshot it describes
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "record", rename_all = "snake_case")]
pub enum TxEvent {
    /// A record was created
    Created(TxRecord),

    /// A record's fields changed
    Updated(TxRecord),
}

impl TxEvent {
    /// The snapshot carried by this event
    pub fn record(&self) -> &TxRecord {
        match self {
            TxEvent::Created(record) | TxEvent::Updated(record) => record,
        }
    }
}

/// Broadcast fan-out for lifecycle events
pub struct EventBus {
    sender: broadcast::Sender<TxEvent>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to lifecycle events from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<TxEvent> {
        self.sender.subscribe()
    }

    // Send errors only mean there are no subscribers right now.
    pub(crate) fn publish(&self, event: TxEvent) {
        let _ = self.sender.send(event);
    }
}
