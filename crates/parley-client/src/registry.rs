//! Live transport client instances, keyed by connection tag.

use std::{collections::HashMap, sync::Arc};

use parley_core::ConnectionId;

/// Transport client instances owned by a driver.
///
/// The session retires an instance before it issues the next connect, so in
/// steady state this holds at most one entry. A retired instance whose
/// disconnect is still in flight is no longer present.
#[derive(Debug)]
pub struct ConnectionRegistry<T> {
    clients: HashMap<ConnectionId, Arc<T>>,
}

impl<T> ConnectionRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { clients: HashMap::new() }
    }

    /// Register the instance for `conn`.
    pub fn insert(&mut self, conn: ConnectionId, client: Arc<T>) {
        if !self.clients.is_empty() {
            tracing::warn!(%conn, live = self.clients.len(), "registering over live instances");
        }
        self.clients.insert(conn, client);
    }

    /// Instance for `conn`, if still registered.
    pub fn get(&self, conn: ConnectionId) -> Option<Arc<T>> {
        self.clients.get(&conn).cloned()
    }

    /// Unregister and return the instance for `conn`.
    pub fn remove(&mut self, conn: ConnectionId) -> Option<Arc<T>> {
        self.clients.remove(&conn)
    }
}

impl<T> Default for ConnectionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
