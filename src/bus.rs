//! Broadcast channel for application lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]: the lifecycle engine and the
//! executor publish [`Event`]s, and any number of observers consume them.
//! Publishing never blocks; a receiver that falls behind sees a `Lagged`
//! error and keeps going.

use tokio::sync::broadcast;

use crate::event::Event;

/// Cheap-to-clone handle to the event channel.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus whose channel buffers up to `capacity` events per
    /// receiver.
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to every current subscriber. A bus with no
    /// subscribers drops the event.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Returns a fresh receiver that sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
