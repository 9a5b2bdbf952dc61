/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Engine builder for fluent configuration.
//!
//! This module provides a builder API for configuring the engine. All
//! connections are validated before any of them is registered.

use crate::engine::Engine;
use crate::handler::ConnectionHandler;
use crate::registry::ConnectionRegistry;
use crate::transport::Transport;
use ironlink_core::error::{ConfigError, Result};
use ironlink_mux::{ReferenceRuleFactory, RuleFactory};
use ironlink_session::{ConnectionConfig, EngineConfig, StartupBarrier};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder for configuring an [`Engine`].
pub struct EngineBuilder {
    /// Outbound transport.
    transport: Option<Arc<dyn Transport>>,
    /// Connections registered at build time.
    connections: Vec<ConnectionConfig>,
    /// Rule factory used by `send_and_correlate`.
    rules: Arc<dyn RuleFactory>,
    /// Engine-wide settings.
    config: EngineConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Creates a new engine builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: None,
            connections: Vec::new(),
            rules: Arc::new(ReferenceRuleFactory::new()),
            config: EngineConfig::default(),
        }
    }

    /// Sets the transport.
    #[must_use]
    pub fn with_transport<T: Transport + 'static>(self, transport: T) -> Self {
        self.with_transport_arc(Arc::new(transport))
    }

    /// Sets a shared transport.
    #[must_use]
    pub fn with_transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Adds a connection configuration.
    #[must_use]
    pub fn add_connection(mut self, config: ConnectionConfig) -> Self {
        self.connections.push(config);
        self
    }

    /// Replaces the default [`ReferenceRuleFactory`].
    #[must_use]
    pub fn with_rule_factory<R: RuleFactory + 'static>(mut self, rules: R) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    /// Replaces the engine settings.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the startup timeout.
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.config.startup_timeout = Some(timeout);
        self
    }

    /// Sets how many messages each subscription buffers.
    #[must_use]
    pub const fn with_sink_capacity(mut self, capacity: usize) -> Self {
        self.config.sink_capacity = capacity;
        self
    }

    /// Returns the configured connections.
    #[must_use]
    pub fn connections(&self) -> &[ConnectionConfig] {
        &self.connections
    }

    /// Returns the engine settings.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates the configuration and builds the engine.
    ///
    /// # Errors
    /// Returns [`ironlink_core::LinkError::Configuration`] if no transport is
    /// set, the sink capacity is zero, or two connections share a name or an
    /// identifier.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;
        let transport = self.transport.ok_or(ConfigError::MissingTransport)?;

        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for config in &self.connections {
            if !names.insert(config.name.as_str()) {
                return Err(ConfigError::DuplicateName(config.name.clone()).into());
            }
            if !ids.insert(&config.connection_id) {
                return Err(ConfigError::DuplicateConnection(config.connection_id.to_string()).into());
            }
        }

        let barrier = Arc::new(StartupBarrier::new(
            self.connections
                .iter()
                .map(|c| (c.connection_id.clone(), c.role.readiness_event())),
        ));

        let registry = ConnectionRegistry::new();
        for config in &self.connections {
            let handler =
                ConnectionHandler::from_config(config, self.config.sink_capacity, Arc::clone(&barrier));
            registry.insert(Arc::new(handler))?;
        }

        info!(
            connections = registry.len(),
            sink_capacity = self.config.sink_capacity,
            "engine built"
        );
        Ok(Engine::new(transport, registry, barrier, self.rules, self.config))
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("transport", &self.transport.is_some())
            .field("connections", &self.connections)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ironlink_core::connection::{ConnectionId, ConnectionRole};
    use ironlink_core::error::{LinkError, TransportError};
    use ironlink_core::message::Message;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn transmit(
            &self,
            _connection: &ConnectionId,
            message: Message,
        ) -> std::result::Result<Message, TransportError> {
            Ok(message)
        }
    }

    fn config(name: &str, target: &str) -> ConnectionConfig {
        ConnectionConfig::new(
            name,
            ConnectionId::new("FIX.4.4", "CLIENT", target),
            ConnectionRole::DialingMultiThreaded,
        )
    }

    #[test]
    fn test_engine_builder_default() {
        let builder = EngineBuilder::new();
        assert!(builder.connections().is_empty());
        assert_eq!(builder.config().sink_capacity, 64);
        assert!(builder.config().startup_timeout.is_none());
    }

    #[test]
    fn test_engine_builder_with_connections() {
        let engine = EngineBuilder::new()
            .with_transport(NullTransport)
            .add_connection(config("a", "A"))
            .add_connection(config("b", "B"))
            .with_startup_timeout(Duration::from_secs(5))
            .with_sink_capacity(16)
            .build()
            .unwrap();

        assert_eq!(engine.connections().len(), 2);
        assert_eq!(engine.config().sink_capacity, 16);
        assert_eq!(engine.config().startup_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_build_requires_transport() {
        let err = EngineBuilder::new().build().unwrap_err();
        assert_eq!(err, LinkError::Configuration(ConfigError::MissingTransport));
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = EngineBuilder::new()
            .with_transport(NullTransport)
            .add_connection(config("a", "A"))
            .add_connection(config("a", "B"))
            .build()
            .unwrap_err();
        assert_eq!(err, LinkError::Configuration(ConfigError::DuplicateName("a".to_string())));

        let err = EngineBuilder::new()
            .with_transport(NullTransport)
            .add_connection(config("a", "A"))
            .add_connection(config("b", "A"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            LinkError::Configuration(ConfigError::DuplicateConnection(_))
        ));
    }

    #[test]
    fn test_build_accepts_connections_differing_by_sub_id() {
        let desk = |sub_id: &str| {
            ironlink_session::ConnectionConfigBuilder::new()
                .sender_comp_id("C")
                .sender_sub_id(sub_id)
                .target_comp_id("B")
                .role(ConnectionRole::DialingMultiThreaded)
                .build()
                .unwrap()
        };

        let engine = EngineBuilder::new()
            .with_transport(NullTransport)
            .add_connection(desk("DESK1"))
            .add_connection(desk("DESK2"))
            .build()
            .unwrap();
        assert_eq!(engine.connections().len(), 2);
        assert!(engine.handler_by_name("FIX.4.4:C/DESK2->B").is_ok());
    }

    #[test]
    fn test_build_rejects_zero_capacity() {
        let err = EngineBuilder::new()
            .with_transport(NullTransport)
            .with_sink_capacity(0)
            .build()
            .unwrap_err();
        assert_eq!(err, LinkError::Configuration(ConfigError::ZeroSinkCapacity));
    }
}
