// SPDX-License-Identifier: MIT OR Apache-2.0
//! Observer-list signals.
//!
//! A [`Signal`] delivers a value to every connected handler in registration
//! order. Handlers may connect or disconnect while the signal is firing;
//! such changes apply from the next firing on.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Slots<T> {
    next_id: u64,
    handlers: Vec<(u64, Handler<T>)>,
}

trait Disconnect: Send + Sync {
    fn disconnect(&self, id: u64) -> bool;
    fn contains(&self, id: u64) -> bool;
}

impl<T> Disconnect for Mutex<Slots<T>> {
    fn disconnect(&self, id: u64) -> bool {
        let mut slots = self.lock();
        let before = slots.handlers.len();
        slots.handlers.retain(|(slot, _)| *slot != id);
        slots.handlers.len() != before
    }

    fn contains(&self, id: u64) -> bool {
        self.lock().handlers.iter().any(|(slot, _)| *slot == id)
    }
}

/// Broadcast channel carrying values of type `T`
pub struct Signal<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<T> Signal<T> {
    /// Create a signal with no subscribers
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Number of connected handlers
    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().handlers.len()
    }

    /// Deliver `value` to every handler connected when firing starts
    pub fn fire(&self, value: &T) {
        let handlers: Vec<Handler<T>> = self
            .slots
            .lock()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(value);
        }
    }
}

impl<T: 'static> Signal<T> {
    /// Connect a handler
    pub fn connect<F>(&self, handler: F) -> Connection
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.handlers.push((id, Arc::new(handler)));
            id
        };

        let weak: Weak<Mutex<Slots<T>>> = Arc::downgrade(&self.slots);
        Connection {
            id,
            slots: weak as Weak<dyn Disconnect>,
        }
    }
}

/// Handle to a connected handler
pub struct Connection {
    id: u64,
    slots: Weak<dyn Disconnect>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Connection {
    /// Disconnect the handler. Returns false if it was already disconnected.
    pub fn disconnect(&self) -> bool {
        self.slots
            .upgrade()
            .is_some_and(|slots| slots.disconnect(self.id))
    }

    /// Whether the handler is still connected
    pub fn is_connected(&self) -> bool {
        self.slots
            .upgrade()
            .is_some_and(|slots| slots.contains(self.id))
    }
}
