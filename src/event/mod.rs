pub mod events;

use std::sync::{Mutex, PoisonError};

use flume::{Receiver, Sender, TrySendError};
use tracing::debug;

use events::SessionEvent;

/// Events held for a subscriber that is not draining its receiver.
pub const SUBSCRIBER_CAPACITY: usize = 64;

/// Fans session events out to every live subscriber. A subscriber whose
/// queue is full misses the event instead of blocking the publisher.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = flume::bounded(SUBSCRIBER_CAPACITY);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, event: SessionEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("subscriber queue full, dropping session event");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
