/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Per-connection handler: the lifecycle plus its multiplexer.

use ironlink_core::connection::{ConnectionId, ConnectionRole};
use ironlink_mux::{Multiplexer, SharedRule, SinkCallbacks, SinkHandle, Subscription};
use ironlink_session::{ConnectionConfig, ConnectionLifecycle, ConnectionState, StartupBarrier};
use std::sync::Arc;

/// Everything the engine keeps for one registered connection.
#[derive(Debug)]
pub struct ConnectionHandler {
    name: String,
    lifecycle: ConnectionLifecycle,
}

impl ConnectionHandler {
    /// Builds the handler for a configured connection.
    ///
    /// # Arguments
    /// * `config` - Connection configuration
    /// * `sink_capacity` - Messages buffered per subscription
    /// * `barrier` - Startup barrier shared by the engine
    #[must_use]
    pub fn from_config(
        config: &ConnectionConfig,
        sink_capacity: usize,
        barrier: Arc<StartupBarrier>,
    ) -> Self {
        let mux = Multiplexer::with_capacity(config.connection_id.clone(), sink_capacity);
        Self {
            name: config.name.clone(),
            lifecycle: ConnectionLifecycle::new(config, mux, barrier),
        }
    }

    /// Returns the configured name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connection identifier.
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        self.lifecycle.connection_id()
    }

    /// Returns the connection role.
    #[must_use]
    pub const fn role(&self) -> ConnectionRole {
        self.lifecycle.role()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Returns the lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> &ConnectionLifecycle {
        &self.lifecycle
    }

    /// Returns the multiplexer.
    #[must_use]
    pub fn multiplexer(&self) -> &Multiplexer {
        self.lifecycle.multiplexer()
    }

    /// Subscribes to inbound messages matching `rule`.
    pub fn subscribe(&self, rule: SharedRule) -> Subscription {
        self.multiplexer().subscribe(rule)
    }

    /// Registers callbacks for inbound messages matching `rule`.
    pub fn register(&self, rule: SharedRule, callbacks: Arc<dyn SinkCallbacks>) -> SinkHandle {
        self.multiplexer().register(rule, callbacks)
    }
}
