//! Per-instance event connections.
//!
//! Listeners are keyed by (instance, event name) and receive the event
//! arguments as [`PropertyValue`]s. Firing never touches the tree, so
//! listeners cannot re-enter tree mutation.

use std::collections::HashMap;

use bevy::ecs::entity::Entity;

use crate::types::PropertyValue;

/// Callback invoked when an event fires
pub type Listener = Box<dyn FnMut(&[PropertyValue]) + Send + Sync>;

/// Handle returned by `connect`, used to disconnect a single listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

#[derive(Default)]
pub struct EventBus {
    next_connection: u64,
    slots: HashMap<(Entity, String), Vec<(ConnectionId, Listener)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, instance: Entity, event: &str, listener: Listener) -> ConnectionId {
        self.next_connection += 1;
        let connection = ConnectionId(self.next_connection);
        self.slots
            .entry((instance, event.to_string()))
            .or_default()
            .push((connection, listener));
        connection
    }

    /// Returns false if the connection was already gone
    pub fn disconnect(&mut self, connection: ConnectionId) -> bool {
        let mut found = false;
        self.slots.retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|(id, _)| *id != connection);
            found |= listeners.len() != before;
            !listeners.is_empty()
        });
        found
    }

    /// Drop every listener attached to `instance`
    pub fn disconnect_all(&mut self, instance: Entity) {
        self.slots.retain(|(owner, _), _| *owner != instance);
    }

    /// Invoke listeners in connection order. Returns how many ran.
    pub fn fire(&mut self, instance: Entity, event: &str, args: &[PropertyValue]) -> usize {
        let Some(listeners) = self.slots.get_mut(&(instance, event.to_string())) else {
            return 0;
        };
        for (_, listener) in listeners.iter_mut() {
            listener(args);
        }
        listeners.len()
    }

    pub fn listener_count(&self, instance: Entity, event: &str) -> usize {
        self.slots
            .get(&(instance, event.to_string()))
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("connections", &self.slots.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
