/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! The engine: registry, transport, and correlated sends.
//!
//! Callers send through the engine and receive correlated replies on a
//! [`Subscription`]. The transport feeds lifecycle events and inbound
//! messages back through the engine's [`Application`] implementation.

use crate::application::{Application, RejectReason};
use crate::handler::ConnectionHandler;
use crate::registry::ConnectionRegistry;
use crate::transport::{Transport, unavailable};
use async_trait::async_trait;
use ironlink_core::connection::ConnectionId;
use ironlink_core::error::{DropCause, LinkError, Result};
use ironlink_core::message::Message;
use ironlink_mux::{RuleFactory, SharedRule, Subscription};
use ironlink_session::{ConnectionConfig, ConnectionState, EngineConfig, StartupBarrier};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, trace, warn};

/// Correlated messaging engine.
pub struct Engine {
    transport: Arc<dyn Transport>,
    registry: ConnectionRegistry,
    barrier: Arc<StartupBarrier>,
    rules: Arc<dyn RuleFactory>,
    config: EngineConfig,
}

impl Engine {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        registry: ConnectionRegistry,
        barrier: Arc<StartupBarrier>,
        rules: Arc<dyn RuleFactory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            barrier,
            rules,
            config,
        }
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers a connection after the engine was built.
    ///
    /// Connections registered this way are not part of the startup barrier.
    ///
    /// # Errors
    /// Returns [`LinkError::Configuration`] if the name or identifier is
    /// already registered.
    pub fn register_connection(&self, config: ConnectionConfig) -> Result<Arc<ConnectionHandler>> {
        let handler = Arc::new(ConnectionHandler::from_config(
            &config,
            self.config.sink_capacity,
            Arc::clone(&self.barrier),
        ));
        self.registry.insert(Arc::clone(&handler))?;
        info!(name = %config.name, connection = %config.connection_id, role = %config.role, "connection registered");
        Ok(handler)
    }

    /// Looks up a connection by identifier.
    ///
    /// # Errors
    /// Returns [`LinkError::RouteNotFound`] for an unknown identifier.
    pub fn handler(&self, connection: &ConnectionId) -> Result<Arc<ConnectionHandler>> {
        self.registry
            .get(connection)
            .ok_or_else(|| LinkError::RouteNotFound {
                connection: connection.to_string(),
            })
    }

    /// Looks up a connection by configured name.
    ///
    /// # Errors
    /// Returns [`LinkError::RouteNotFound`] for an unknown name.
    pub fn handler_by_name(&self, name: &str) -> Result<Arc<ConnectionHandler>> {
        self.registry
            .get_by_name(name)
            .ok_or_else(|| LinkError::RouteNotFound {
                connection: name.to_string(),
            })
    }

    /// Returns the lifecycle state of a connection.
    ///
    /// # Errors
    /// Returns [`LinkError::RouteNotFound`] for an unknown identifier.
    pub fn state(&self, connection: &ConnectionId) -> Result<ConnectionState> {
        Ok(self.handler(connection)?.state())
    }

    /// Returns the identifiers of every registered connection, sorted.
    #[must_use]
    pub fn connections(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .registry
            .handlers()
            .iter()
            .map(|h| h.connection_id().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Sends an application message; returns it as sent.
    ///
    /// # Errors
    /// - [`LinkError::RouteNotFound`] for an unknown connection
    /// - [`LinkError::NotEstablished`] if the connection is not logged on
    /// - [`LinkError::TransportUnavailable`] if the transport fails
    pub async fn send(&self, connection: &ConnectionId, message: Message) -> Result<Message> {
        let handler = self.established(connection)?;
        self.transmit(&handler, message).await
    }

    /// Sends a request and subscribes to its replies using the engine's
    /// rule factory.
    ///
    /// # Errors
    /// As [`Engine::send`].
    pub async fn send_and_correlate(
        &self,
        connection: &ConnectionId,
        message: Message,
    ) -> Result<Subscription> {
        let rules = Arc::clone(&self.rules);
        self.send_and_correlate_with(connection, message, rules.as_ref())
            .await
    }

    /// Sends a request and subscribes to its replies using `rules`.
    ///
    /// The subscription is registered before the request is transmitted, so
    /// replies delivered while the transport is still sending are kept. The
    /// rule then learns the message as sent, including the sequence number
    /// the transport stamped. If the transport fails the subscription is
    /// disposed.
    ///
    /// # Errors
    /// As [`Engine::send`].
    pub async fn send_and_correlate_with(
        &self,
        connection: &ConnectionId,
        message: Message,
        rules: &dyn RuleFactory,
    ) -> Result<Subscription> {
        let handler = self.established(connection)?;
        let rule = rules.rule_for(&message);
        let subscription = handler.subscribe(Arc::clone(&rule));
        let sent = match self.transmit(&handler, message).await {
            Ok(sent) => sent,
            Err(err) => {
                subscription.dispose();
                return Err(err);
            }
        };
        rule.on_sent(&sent);
        debug!(
            connection = %connection,
            msg_type = %sent.msg_type(),
            sink = %subscription.sink_id(),
            "awaiting correlated replies"
        );
        Ok(subscription)
    }

    /// Subscribes to inbound messages matching `rule`, without sending.
    ///
    /// # Errors
    /// Returns [`LinkError::RouteNotFound`] for an unknown connection.
    pub fn subscribe(&self, connection: &ConnectionId, rule: SharedRule) -> Result<Subscription> {
        Ok(self.handler(connection)?.subscribe(rule))
    }

    /// Blocks until every connection configured at build time is ready.
    ///
    /// `None` returns immediately.
    ///
    /// # Errors
    /// Returns [`LinkError::StartupTimeout`] naming the connections still
    /// pending.
    pub fn await_startup(&self, timeout: Option<Duration>) -> Result<()> {
        self.barrier.wait(timeout)
    }

    /// Async variant of [`Engine::await_startup`].
    ///
    /// # Errors
    /// As [`Engine::await_startup`].
    pub async fn await_startup_async(&self, timeout: Option<Duration>) -> Result<()> {
        self.barrier.wait_async(timeout).await
    }

    /// Tears down every connection's waiters without an error.
    pub fn close(&self) {
        for handler in self.registry.handlers() {
            handler.multiplexer().close();
        }
        info!("engine closed");
    }

    fn established(&self, connection: &ConnectionId) -> Result<Arc<ConnectionHandler>> {
        let handler = self.handler(connection)?;
        let state = handler.state();
        if !state.is_established() {
            return Err(LinkError::NotEstablished {
                connection: connection.clone(),
                state: state.to_string(),
            });
        }
        Ok(handler)
    }

    async fn transmit(&self, handler: &ConnectionHandler, message: Message) -> Result<Message> {
        let connection = handler.connection_id();
        trace!(connection = %connection, msg_type = %message.msg_type(), "transmitting");
        self.transport
            .transmit(connection, message)
            .instrument(handler.lifecycle().span().clone())
            .await
            .map_err(|err| {
                warn!(connection = %connection, %err, "transport rejected message");
                unavailable(connection, err)
            })
    }

    fn lookup(&self, connection: &ConnectionId, callback: &'static str) -> Option<Arc<ConnectionHandler>> {
        let handler = self.registry.get(connection);
        if handler.is_none() {
            warn!(connection = %connection, callback, "callback for unregistered connection");
        }
        handler
    }

    fn route_inbound(&self, message: &Message, connection: &ConnectionId) -> std::result::Result<(), RejectReason> {
        let Some(handler) = self.lookup(connection, "inbound") else {
            return Err(RejectReason::from(LinkError::RouteNotFound {
                connection: connection.to_string(),
            }));
        };
        match handler.lifecycle().on_inbound(message) {
            Ok(_) => Ok(()),
            Err(err) => Err(RejectReason::from(err)),
        }
    }
}

#[async_trait]
impl Application for Engine {
    async fn on_create(&self, connection: &ConnectionId) {
        if let Some(handler) = self.lookup(connection, "on_create")
            && let Err(err) = handler.lifecycle().on_create()
        {
            debug!(connection = %connection, %err, "on_create ignored");
        }
    }

    async fn on_logon(&self, connection: &ConnectionId) {
        if let Some(handler) = self.lookup(connection, "on_logon")
            && let Err(err) = handler.lifecycle().on_established()
        {
            debug!(connection = %connection, %err, "on_logon ignored");
        }
    }

    async fn on_logout(&self, connection: &ConnectionId) {
        if let Some(handler) = self.lookup(connection, "on_logout") {
            handler.lifecycle().on_dropped(DropCause::Disconnect, None);
        }
    }

    async fn to_admin(
        &self,
        message: &mut Message,
        connection: &ConnectionId,
    ) -> std::result::Result<(), RejectReason> {
        let Some(handler) = self.lookup(connection, "to_admin") else {
            return Ok(());
        };
        handler
            .lifecycle()
            .on_outbound_admin(message)
            .map_err(RejectReason::from)
    }

    async fn from_admin(
        &self,
        message: &Message,
        connection: &ConnectionId,
    ) -> std::result::Result<(), RejectReason> {
        self.route_inbound(message, connection)
    }

    async fn to_app(
        &self,
        message: &mut Message,
        connection: &ConnectionId,
    ) -> std::result::Result<(), RejectReason> {
        if let Some(handler) = self.lookup(connection, "to_app") {
            handler.lifecycle().on_outbound_app(message);
        }
        Ok(())
    }

    async fn from_app(
        &self,
        message: &Message,
        connection: &ConnectionId,
    ) -> std::result::Result<(), RejectReason> {
        self.route_inbound(message, connection)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("connections", &self.registry.len())
            .field("pending_startup", &self.barrier.remaining())
            .field("config", &self.config)
            .finish()
    }
}
