/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Per-connection lifecycle.
//!
//! Tracks one connection through created, authenticating, established and
//! dropped; authenticates handshakes; gates inbound traffic; and feeds the
//! connection's multiplexer its drop and resume signals.
//!
//! The state lock is never held while sink callbacks run.

use crate::barrier::StartupBarrier;
use crate::config::{ConnectionConfig, Credentials};
use crate::state::ConnectionState;
use ironlink_core::connection::{ConnectionId, ConnectionRole, ReadinessEvent};
use ironlink_core::error::{ConnectionDropped, DropCause, LinkError, Result, SessionError};
use ironlink_core::field::tags;
use ironlink_core::message::{Message, MessageKind};
use ironlink_mux::Multiplexer;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{Span, debug, error, info, info_span, trace, warn};

/// Lifecycle state machine of one connection.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    connection: ConnectionId,
    role: ConnectionRole,
    credentials: Option<Credentials>,
    state: Mutex<ConnectionState>,
    /// Text of the last outbound Logout, used as the drop reason.
    logout_text: Mutex<Option<String>>,
    mux: Multiplexer,
    barrier: Arc<StartupBarrier>,
    span: Span,
}

impl ConnectionLifecycle {
    /// Creates the lifecycle for a configured connection.
    ///
    /// # Arguments
    /// * `config` - Connection identity, role, and credentials
    /// * `mux` - The connection's multiplexer
    /// * `barrier` - Startup barrier; connections it does not list are ignored by it
    #[must_use]
    pub fn new(config: &ConnectionConfig, mux: Multiplexer, barrier: Arc<StartupBarrier>) -> Self {
        let span = info_span!("connection", id = %config.connection_id);
        Self {
            connection: config.connection_id.clone(),
            role: config.role,
            credentials: config.credentials.clone(),
            state: Mutex::new(ConnectionState::Created),
            logout_text: Mutex::new(None),
            mux,
            barrier,
            span,
        }
    }

    /// Returns the connection identifier.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection
    }

    /// Returns the connection role.
    #[inline]
    #[must_use]
    pub const fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Returns the connection's multiplexer.
    #[must_use]
    pub fn multiplexer(&self) -> &Multiplexer {
        &self.mux
    }

    /// Records creation of the physical session.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] if the connection is
    /// currently authenticating or established.
    pub fn on_create(&self) -> std::result::Result<(), SessionError> {
        let _entered = self.span.enter();
        self.transition(ConnectionState::Created)?;
        info!("connection created");
        self.barrier.arrive(&self.connection, ReadinessEvent::Created);
        Ok(())
    }

    /// Records a completed handshake and re-opens the correlation gate.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] unless the connection is
    /// authenticating.
    pub fn on_established(&self) -> std::result::Result<(), SessionError> {
        let _entered = self.span.enter();
        {
            let mut state = self.state.lock();
            let next = self.checked(*state, ConnectionState::Established)?;
            self.mux.resume();
            *state = next;
        }
        self.logout_text.lock().take();
        info!("connection established");
        self.barrier.arrive(&self.connection, ReadinessEvent::Established);
        Ok(())
    }

    /// Marks the connection dropped and fails every waiter.
    ///
    /// The reason is the Text (58) of `message` when given, otherwise that of
    /// the last outbound Logout. Returns false, broadcasting nothing, if the
    /// connection was already dropped.
    pub fn on_dropped(&self, cause: DropCause, message: Option<&Message>) -> bool {
        let _entered = self.span.enter();
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Dropped {
                debug!(%cause, "already dropped");
                return false;
            }
            *state = ConnectionState::Dropped;
        }

        let sent_logout = self.logout_text.lock().take();
        let (cause, reason) = match message {
            Some(message) => (cause, message.get_field_str(tags::TEXT).map(str::to_string)),
            None => match sent_logout {
                Some(text) if cause == DropCause::Disconnect => (DropCause::Logout, Some(text)),
                _ => (cause, None),
            },
        };

        let mut dropped = ConnectionDropped::new(self.connection.clone(), cause);
        dropped.reason = reason.filter(|r| !r.is_empty());
        info!(%cause, reason = dropped.reason.as_deref().unwrap_or(""), "connection dropped");
        self.mux.dispatch_error(dropped);
        true
    }

    /// Prepares an outbound handshake.
    ///
    /// Dialing roles with configured credentials get Username (553) and
    /// Password (554) set, replacing any values already present. Messages
    /// other than a handshake pass through untouched.
    ///
    /// # Errors
    /// Returns [`LinkError::Session`] if the connection cannot start
    /// authenticating from its current state.
    pub fn authenticate_outbound(&self, message: &mut Message) -> Result<()> {
        if message.kind() != MessageKind::Handshake {
            return Ok(());
        }
        let _entered = self.span.enter();
        self.transition(ConnectionState::Authenticating)?;

        if !self.role.presents_credentials() {
            return Ok(());
        }
        if let Some(credentials) = &self.credentials {
            message.set_field(tags::USERNAME, credentials.username.as_str());
            message.set_field(tags::PASSWORD, credentials.password.as_str());
            debug!(username = %credentials.username, "credentials attached to handshake");
        }
        Ok(())
    }

    /// Validates an inbound handshake.
    ///
    /// Listening roles with configured credentials require Username (553) and
    /// Password (554) to match exactly. A rejected handshake drops the
    /// connection with cause [`DropCause::AuthenticationRejected`].
    ///
    /// # Errors
    /// Returns [`LinkError::AuthenticationRejected`] on missing or mismatched
    /// credentials, [`LinkError::Session`] on an invalid transition.
    pub fn authenticate_inbound(&self, message: &Message) -> Result<()> {
        if message.kind() != MessageKind::Handshake {
            return Ok(());
        }
        let _entered = self.span.enter();
        self.transition(ConnectionState::Authenticating)?;

        if !self.role.validates_credentials() {
            return Ok(());
        }
        let Some(expected) = &self.credentials else {
            return Ok(());
        };

        let reason = match (
            message.get_field_str(tags::USERNAME),
            message.get_field_str(tags::PASSWORD),
        ) {
            (Some(username), Some(password))
                if username == expected.username && password == expected.password =>
            {
                debug!(%username, "handshake credentials accepted");
                return Ok(());
            }
            (None, _) | (_, None) => "credentials missing",
            _ => "credentials mismatch",
        };

        warn!(reason, "handshake rejected");
        {
            let mut state = self.state.lock();
            *state = ConnectionState::Dropped;
        }
        let dropped = ConnectionDropped::new(self.connection.clone(), DropCause::AuthenticationRejected)
            .with_reason(reason);
        self.mux.dispatch_error(dropped);

        Err(LinkError::AuthenticationRejected {
            connection: self.connection.clone(),
            reason: reason.to_string(),
        })
    }

    /// Processes an outbound session message.
    ///
    /// # Errors
    /// As [`ConnectionLifecycle::authenticate_outbound`].
    pub fn on_outbound_admin(&self, message: &mut Message) -> Result<()> {
        match message.kind() {
            MessageKind::Handshake => self.authenticate_outbound(message),
            MessageKind::Logout => {
                let text = message.get_field_str(tags::TEXT).map(str::to_string);
                *self.logout_text.lock() = Some(text.unwrap_or_default());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Tags an outbound application message with this connection.
    pub fn on_outbound_app(&self, message: &Message) {
        let _entered = self.span.enter();
        if message.kind() != MessageKind::Keepalive {
            trace!(msg_type = %message.msg_type(), "outbound application message");
        }
    }

    /// Returns the span every event of this connection is recorded in.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Routes one inbound message; returns the number of sinks it reached.
    ///
    /// Keepalives are only traced. Handshakes are authenticated. A Logout
    /// drops the connection. Application and reject messages are dispatched
    /// to the multiplexer only while established; otherwise they are logged
    /// and discarded.
    ///
    /// # Errors
    /// Returns the authentication error for a rejected handshake.
    pub fn on_inbound(&self, message: &Message) -> Result<usize> {
        let kind = message.kind();
        if kind == MessageKind::Keepalive {
            trace!(connection = %self.connection, msg_type = %message.msg_type(), "keepalive");
            return Ok(0);
        }

        let _entered = self.span.enter();
        match kind {
            MessageKind::Handshake => {
                self.authenticate_inbound(message)?;
                Ok(0)
            }
            MessageKind::Logout => {
                self.on_dropped(DropCause::Logout, Some(message));
                Ok(0)
            }
            _ => {
                let state = self.state();
                if !state.is_established() {
                    warn!(%state, msg_type = %message.msg_type(), "discarding message received before establishment");
                    return Ok(0);
                }
                Ok(self.mux.dispatch(message))
            }
        }
    }

    fn transition(&self, next: ConnectionState) -> std::result::Result<(), SessionError> {
        let mut state = self.state.lock();
        *state = self.checked(*state, next)?;
        Ok(())
    }

    fn checked(
        &self,
        current: ConnectionState,
        next: ConnectionState,
    ) -> std::result::Result<ConnectionState, SessionError> {
        let result = current.transition(next, &self.connection);
        match &result {
            Ok(_) if current != next => debug!(from = %current, to = %next, "state transition"),
            Ok(_) => {}
            Err(err) => error!(%err, "rejected state transition"),
        }
        result
    }
}
