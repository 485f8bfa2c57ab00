//! Event Notifier
//!
//! Fire-and-forget publication of terminal movements. `notify` only enqueues
//! into a bounded channel and never waits; a background task delivers each
//! event to the publisher with retry and backoff. A full queue or an
//! exhausted retry budget is logged and counted, never reported back to the
//! movement that produced the event.

pub mod publishers;

pub use publishers::{BroadcastPublisher, LogPublisher};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::NotifierConfig;
use crate::core_types::{HoldingId, MovementId};
use crate::movement::{Movement, MovementKind, MovementStatus};

pub const ROUTING_KEY_COMPLETED: &str = "movement.completed";
pub const ROUTING_KEY_FAILED: &str = "movement.failed";

/// Published shape of a terminal movement.
///
/// Delivery is at-least-once; consumers dedupe on `movement_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementEvent {
    pub movement_id: MovementId,
    pub kind: MovementKind,
    pub source_holding: Option<HoldingId>,
    pub dest_holding: Option<HoldingId>,
    pub source_amount: Decimal,
    pub dest_amount: Decimal,
    pub rate: Decimal,
    pub status: MovementStatus,
}

impl MovementEvent {
    pub fn routing_key(&self) -> &'static str {
        match self.status {
            MovementStatus::Failed => ROUTING_KEY_FAILED,
            _ => ROUTING_KEY_COMPLETED,
        }
    }
}

impl From<&Movement> for MovementEvent {
    fn from(m: &Movement) -> Self {
        Self {
            movement_id: m.id,
            kind: m.kind,
            source_holding: m.source_holding,
            dest_holding: m.dest_holding,
            source_amount: m.source_amount,
            dest_amount: m.dest_amount,
            rate: m.rate,
            status: m.status,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Publish rejected: {0}")]
    Rejected(String),
}

/// Pub/sub sink for movement events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, event: &MovementEvent) -> Result<(), PublishError>;
}

#[derive(Debug, Default)]
struct NotifierStats {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotifierStatsSnapshot {
    pub enqueued: u64,
    pub delivered: u64,
    /// Gave up after the retry budget
    pub failed: u64,
    /// Queue full or delivery task gone
    pub dropped: u64,
}

/// Handle for enqueueing events; cheap to clone
#[derive(Clone)]
pub struct EventNotifier {
    tx: mpsc::Sender<MovementEvent>,
    stats: Arc<NotifierStats>,
}

impl EventNotifier {
    /// Start the delivery task and return the enqueue handle.
    ///
    /// The task exits once every handle is dropped and the queue is drained.
    pub fn spawn(
        publisher: Arc<dyn EventPublisher>,
        config: &NotifierConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let stats = Arc::new(NotifierStats::default());
        let handle = tokio::spawn(delivery_loop(
            rx,
            publisher,
            stats.clone(),
            config.max_delivery_attempts.max(1),
            Duration::from_millis(config.retry_backoff_ms),
        ));
        (Self { tx, stats }, handle)
    }

    /// Enqueue an event without waiting. Returns false if it was dropped.
    pub fn notify(&self, event: MovementEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!(movement_id = %event.movement_id, "Notifier queue full, event dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                error!(movement_id = %event.movement_id, "Notifier stopped, event dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> NotifierStatsSnapshot {
        NotifierStatsSnapshot {
            enqueued: self.stats.enqueued.load(Ordering::Relaxed),
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn delivery_loop(
    mut rx: mpsc::Receiver<MovementEvent>,
    publisher: Arc<dyn EventPublisher>,
    stats: Arc<NotifierStats>,
    max_attempts: u32,
    backoff: Duration,
) {
    while let Some(event) = rx.recv().await {
        let mut delay = backoff;
        let mut attempt = 1;
        loop {
            match publisher.publish(&event).await {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        movement_id = %event.movement_id,
                        routing_key = event.routing_key(),
                        publisher = publisher.name(),
                        "Event delivered"
                    );
                    break;
                }
                Err(e) if attempt < max_attempts => {
                    warn!(
                        movement_id = %event.movement_id,
                        attempt,
                        error = %e,
                        "Event delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        movement_id = %event.movement_id,
                        attempts = attempt,
                        error = %e,
                        "Event delivery abandoned"
                    );
                    break;
                }
            }
        }
    }
    debug!(publisher = publisher.name(), "Notifier delivery loop stopped");
}


#[cfg(test)]
mod tests {
    use super::mock::MockPublisher;
    use super::*;
    use crate::core_types::{Asset, OwnerId};
    use rust_decimal_macros::dec;

    fn config(queue_size: usize, attempts: u32) -> NotifierConfig {
        NotifierConfig {
            queue_size,
            max_delivery_attempts: attempts,
            retry_backoff_ms: 1,
        }
    }

    fn completed_event() -> MovementEvent {
        let mut movement = Movement::pending(
            MovementId::new(),
            MovementKind::Deposit,
            OwnerId::new(),
            None,
            Some(HoldingId::new()),
            Asset::USD,
            Asset::USD,
            dec!(5),
            Decimal::ONE,
        )
        .unwrap();
        movement
            .transition_to(MovementStatus::Completed, None)
            .unwrap();
        MovementEvent::from(&movement)
    }

    #[test]
    fn test_event_shape() {
        let event = completed_event();
        assert_eq!(event.routing_key(), ROUTING_KEY_COMPLETED);
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("movementId").is_some());
        assert!(json.get("sourceHolding").unwrap().is_null());
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["kind"], "DEPOSIT");
    }

    #[tokio::test]
    async fn test_delivers_with_retry() {
        let publisher = Arc::new(MockPublisher::new());
        publisher.fail_next(2);
        let (notifier, handle) = EventNotifier::spawn(publisher.clone(), &config(8, 5));

        let event = completed_event();
        assert!(notifier.notify(event.clone()));
        let stats = notifier.stats();
        assert_eq!(stats.enqueued, 1);
        // Dropping the last handle lets the loop drain and exit
        drop(notifier);
        handle.await.unwrap();

        assert_eq!(publisher.events(), vec![event]);
        assert_eq!(publisher.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let publisher = Arc::new(MockPublisher::new());
        publisher.fail_next(10);
        let (notifier, handle) = EventNotifier::spawn(publisher.clone(), &config(8, 2));

        notifier.notify(completed_event());
        let _ = tokio::time::timeout(Duration::from_secs(1), async {
            while notifier.stats().failed == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        let stats = notifier.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.delivered, 0);
        assert_eq!(publisher.call_count(), 2);
        drop(notifier);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        // No delivery task draining the queue
        let (tx, _rx) = mpsc::channel(1);
        let notifier = EventNotifier {
            tx,
            stats: Arc::new(NotifierStats::default()),
        };

        assert!(notifier.notify(completed_event()));
        assert!(!notifier.notify(completed_event()));
        let stats = notifier.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.dropped, 1);
    }
}
