//! In-memory event bus for tests/dev.

use std::sync::{RwLock, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

/// Channel-backed pub/sub bus with no IO and no async.
///
/// Every subscriber gets its own channel and receives every published
/// message. Delivery is at-least-once from the consumer's point of view,
/// so projections fed by this bus must be idempotent. A subscriber whose
/// receiving end has been dropped is pruned on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    senders: RwLock<Vec<mpsc::Sender<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscriptions that have not yet been pruned.
    ///
    /// Dropped subscribers are only detected during publish, so this can
    /// briefly overcount.
    pub fn subscriber_count(&self) -> usize {
        self.senders.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            senders: RwLock::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut senders = self
            .senders
            .write()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        // Fan out, pruning subscribers whose receiver is gone.
        senders.retain(|tx| tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never
        // receives anything.
        if let Ok(mut senders) = self.senders.write() {
            senders.push(tx);
        }

        Subscription::new(rx)
    }
}
