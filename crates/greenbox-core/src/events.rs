//! Engine event system.
//!
//! Sync outcomes, discarded late responses, entity changes and the result of
//! every best-effort remote acknowledgement are broadcast here, so consumers
//! can observe what the published snapshot alone does not tell them.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::inbox::RemoteAck;
use crate::sync::Trigger;

/// Events emitted by the engine.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum EngineEvent {
    /// A refresh cycle was applied and published.
    SyncCompleted {
        entity_id: Option<String>,
        trigger: Trigger,
        online: bool,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    /// A cycle finished after the active entity changed and was dropped.
    ResponseDiscarded {
        origin_entity_id: Option<String>,
        active_entity_id: Option<String>,
    },
    /// The active entity was selected or cleared.
    EntityChanged { entity_id: Option<String> },
    /// The gateway accepted an acknowledgement.
    AckSucceeded { ack: RemoteAck },
    /// An acknowledgement failed; local state was kept.
    AckFailed { ack: RemoteAck, error: String },
}

/// Sender for engine events.
pub type EventSender = broadcast::Sender<EngineEvent>;

/// Receiver for engine events.
pub type EventReceiver = broadcast::Receiver<EngineEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: EngineEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
