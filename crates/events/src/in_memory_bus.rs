//! In-memory event bus.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InMemoryBusError {
    /// Internal lock poisoned by a panicking publisher.
    Poisoned,
    /// [`InMemoryEventBus::close`] was called.
    Closed,
}

#[derive(Debug)]
struct Fanout<M> {
    senders: Vec<mpsc::Sender<M>>,
    closed: bool,
}

/// Process-local pub/sub bus over `std::sync::mpsc` channels.
///
/// Fan-out is best effort: a subscriber whose receiver is gone is pruned on
/// the next publish. Closing the bus drops every sender, so draining
/// subscribers observe a disconnect once they have read what was queued.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    fanout: Mutex<Fanout<M>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriptions as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.fanout.lock().map(|f| f.senders.len()).unwrap_or(0)
    }

    /// Refuse further publishes and disconnect all subscribers.
    pub fn close(&self) {
        let mut fanout = match self.fanout.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        fanout.closed = true;
        fanout.senders.clear();
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            fanout: Mutex::new(Fanout {
                senders: Vec::new(),
                closed: false,
            }),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut fanout = self.fanout.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        if fanout.closed {
            return Err(InMemoryBusError::Closed);
        }
        fanout.senders.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // Subscribing to a closed or poisoned bus yields an already
        // disconnected subscription.
        if let Ok(mut fanout) = self.fanout.lock() {
            if !fanout.closed {
                fanout.senders.push(tx);
            }
        }

        Subscription::new(rx)
    }
}
