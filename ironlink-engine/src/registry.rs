/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Connection registry.
//!
//! Maps connection identifiers and configured names to their handlers. Both
//! indexes live behind one lock so they never disagree.

use crate::handler::ConnectionHandler;
use ironlink_core::connection::ConnectionId;
use ironlink_core::error::ConfigError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Indexes {
    by_id: HashMap<ConnectionId, Arc<ConnectionHandler>>,
    by_name: HashMap<String, ConnectionId>,
}

/// Lookup table of registered connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    indexes: RwLock<Indexes>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    ///
    /// # Errors
    /// Returns [`ConfigError::DuplicateName`] or
    /// [`ConfigError::DuplicateConnection`] if either key is taken; nothing is
    /// registered in that case.
    pub fn insert(&self, handler: Arc<ConnectionHandler>) -> Result<(), ConfigError> {
        let mut indexes = self.indexes.write();
        if indexes.by_name.contains_key(handler.name()) {
            return Err(ConfigError::DuplicateName(handler.name().to_string()));
        }
        if indexes.by_id.contains_key(handler.connection_id()) {
            return Err(ConfigError::DuplicateConnection(
                handler.connection_id().to_string(),
            ));
        }
        indexes
            .by_name
            .insert(handler.name().to_string(), handler.connection_id().clone());
        indexes
            .by_id
            .insert(handler.connection_id().clone(), handler);
        Ok(())
    }

    /// Looks up a handler by connection identifier.
    #[must_use]
    pub fn get(&self, connection: &ConnectionId) -> Option<Arc<ConnectionHandler>> {
        self.indexes.read().by_id.get(connection).cloned()
    }

    /// Looks up a handler by configured name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<Arc<ConnectionHandler>> {
        let indexes = self.indexes.read();
        indexes
            .by_name
            .get(name)
            .and_then(|id| indexes.by_id.get(id))
            .cloned()
    }

    /// Returns every registered handler.
    #[must_use]
    pub fn handlers(&self) -> Vec<Arc<ConnectionHandler>> {
        self.indexes.read().by_id.values().cloned().collect()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.read().by_id.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
