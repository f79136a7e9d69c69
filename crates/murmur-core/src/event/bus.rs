//! Runtime event bus.
//!
//! One `tokio::sync::broadcast` channel per `AgentRuntime`. Publishing never
//! blocks and never fails; with nobody listening the event is dropped.
//! Observers that only care about run lifecycle use [`RunSubscription`].

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{trace, warn};

use murmur_types::event::{RunInfo, RuntimeEvent};

/// Capacity of the runtime's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Broadcast channel of [`RuntimeEvent`]s. Clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RuntimeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    /// Receive only `RunStarted`, `RunEnded` and `RunTimeout` payloads.
    pub fn subscribe_runs(&self) -> RunSubscription {
        RunSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, event: RuntimeEvent) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(broadcast::error::SendError(event)) => {
                trace!(run_id = ?event.run_id(), "No event subscribers");
                0
            }
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

/// Run lifecycle view over the event bus.
///
/// A lagging subscriber skips what it missed and keeps going.
#[derive(Debug)]
pub struct RunSubscription {
    receiver: broadcast::Receiver<RuntimeEvent>,
}

impl RunSubscription {
    /// Next run lifecycle payload, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<RunInfo> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(info) = run_info(event) {
                        return Some(info);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Run subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Drain run payloads already buffered, without waiting.
    pub fn drain(&mut self) -> Vec<RunInfo> {
        let mut out = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => out.extend(run_info(event)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Run subscriber lagged, events dropped");
                }
                Err(_) => return out,
            }
        }
    }
}

fn run_info(event: RuntimeEvent) -> Option<RunInfo> {
    match event {
        RuntimeEvent::RunStarted(info)
        | RuntimeEvent::RunEnded(info)
        | RuntimeEvent::RunTimeout(info) => Some(info),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use murmur_types::event::RunStatus;
    use uuid::Uuid;

    fn received() -> RuntimeEvent {
        RuntimeEvent::MessageReceived {
            message_id: Uuid::now_v7(),
            room_id: Uuid::now_v7(),
        }
    }

    fn run(status: RunStatus) -> RunInfo {
        RunInfo {
            run_id: Uuid::now_v7(),
            room_id: Uuid::now_v7(),
            entity_id: Uuid::now_v7(),
            start_time: Utc::now(),
            status,
            duration_ms: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn every_subscriber_gets_each_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();

        assert_eq!(bus.publish(received()), 2);

        assert!(matches!(rx1.recv().await.unwrap(), RuntimeEvent::MessageReceived { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), RuntimeEvent::MessageReceived { .. }));
    }

    #[test]
    fn publishing_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(received()), 0);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn run_subscription_skips_other_events() {
        let bus = EventBus::new(16);
        let mut runs = bus.subscribe_runs();
        let started = run(RunStatus::Started);

        bus.publish(received());
        bus.publish(RuntimeEvent::RunStarted(started.clone()));
        bus.publish(RuntimeEvent::ModelUsed {
            model_type: "TEXT_LARGE".to_string(),
            provider: "scripted".to_string(),
            duration_ms: 3,
            success: true,
        });
        bus.publish(RuntimeEvent::RunTimeout(run(RunStatus::Timeout)));

        assert_eq!(runs.next().await, Some(started));
        let rest = runs.drain();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].status, RunStatus::Timeout);
    }

    #[tokio::test]
    async fn lagging_run_subscriber_recovers() {
        let bus = EventBus::new(2);
        let mut runs = bus.subscribe_runs();

        for _ in 0..5 {
            bus.publish(RuntimeEvent::RunEnded(run(RunStatus::Completed)));
        }

        // the oldest events were overwritten; the newest two remain
        assert_eq!(runs.drain().len(), 2);
    }

    #[tokio::test]
    async fn run_subscription_ends_with_the_bus() {
        let bus = EventBus::new(4);
        let mut runs = bus.subscribe_runs();
        drop(bus);
        assert_eq!(runs.next().await, None);
    }
}
