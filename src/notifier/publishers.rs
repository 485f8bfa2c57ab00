//! Event publishers

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::{EventPublisher, MovementEvent, PublishError};

/// In-process pub/sub fan-out.
///
/// Having no subscribers is not an error: the event is simply not observed.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<MovementEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MovementEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn publish(&self, event: &MovementEvent) -> Result<(), PublishError> {
        if self.tx.send(event.clone()).is_err() {
            tracing::trace!(movement_id = %event.movement_id, "No event subscribers");
        }
        Ok(())
    }
}

/// Writes one JSON line per event to the `movement_events` log target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, event: &MovementEvent) -> Result<(), PublishError> {
        let line =
            serde_json::to_string(event).map_err(|e| PublishError::Rejected(e.to_string()))?;
        tracing::info!(
            target: "movement_events",
            routing_key = event.routing_key(),
            "{}",
            line
        );
        Ok(())
    }
}
