/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for IronLink.
//!
//! Errors fall into two families. Connection-scoped terminal errors
//! ([`ConnectionDropped`]) are broadcast to waiting sinks through their error
//! callback and never travel up the dispatch call stack. Caller errors
//! ([`LinkError::RouteNotFound`], [`LinkError::TransportUnavailable`], ...)
//! are returned synchronously from the operation that caused them.

use crate::connection::ConnectionId;
use crate::types::Timestamp;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`LinkError`] as the error type.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Top-level error type for all IronLink operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Handshake credentials were missing or did not match.
    #[error("authentication rejected for {connection}: {reason}")]
    AuthenticationRejected {
        /// Connection whose handshake was rejected.
        connection: ConnectionId,
        /// Why the handshake was rejected.
        reason: String,
    },

    /// The connection was lost; terminal until it is re-established.
    #[error(transparent)]
    ConnectionDropped(#[from] ConnectionDropped),

    /// The caller addressed a connection the registry does not know.
    #[error("no route to connection {connection}")]
    RouteNotFound {
        /// The identifier or name that was looked up.
        connection: String,
    },

    /// Not every configured connection became ready before the deadline.
    #[error("startup timed out after {timeout:?}; still pending: {pending:?}")]
    StartupTimeout {
        /// The configured startup timeout.
        timeout: Duration,
        /// Connections that never reached their readiness event.
        pending: Vec<String>,
    },

    /// The transport has no live path for a registered connection.
    #[error("transport unavailable for {connection}: {reason}")]
    TransportUnavailable {
        /// Target connection.
        connection: ConnectionId,
        /// Reason reported by the transport.
        reason: String,
    },

    /// An application message was sent on a connection that is not logged on.
    #[error("connection {connection} is not established (state {state})")]
    NotEstablished {
        /// Target connection.
        connection: ConnectionId,
        /// Lifecycle state at the time of the send.
        state: String,
    },

    /// Invalid configuration detected before registration.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Error in the connection lifecycle.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl LinkError {
    /// Returns true if this error terminates every exchange on its connection.
    #[must_use]
    pub const fn is_connection_terminal(&self) -> bool {
        matches!(self, Self::ConnectionDropped(_))
    }
}

/// What caused a connection to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropCause {
    /// The physical connection went away.
    Disconnect,
    /// A Logout was exchanged.
    Logout,
    /// The handshake was rejected.
    AuthenticationRejected,
}

impl DropCause {
    /// Returns a short lowercase label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnect => "disconnect",
            Self::Logout => "logout",
            Self::AuthenticationRejected => "authentication rejected",
        }
    }
}

impl fmt::Display for DropCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error broadcast to every sink of a dropped connection.
///
/// Cheap to clone: every sink receives its own copy, and the multiplexer keeps
/// one as the drop record until the connection is re-established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDropped {
    /// The dropped connection.
    pub connection: ConnectionId,
    /// What caused the drop.
    pub cause: DropCause,
    /// Human-readable reason taken from the disconnect message, if any.
    pub reason: Option<String>,
    /// When the drop was recorded.
    pub dropped_at: Timestamp,
}

impl ConnectionDropped {
    /// Creates a drop error stamped with the current time.
    #[must_use]
    pub fn new(connection: ConnectionId, cause: DropCause) -> Self {
        Self {
            connection,
            cause,
            reason: None,
            dropped_at: Timestamp::now(),
        }
    }

    /// Attaches a human-readable reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ConnectionDropped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {} dropped ({})", self.connection, self.cause)?;
        if let Some(reason) = &self.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConnectionDropped {}

/// Errors in the connection lifecycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The requested state transition is not allowed from the current state.
    #[error("invalid transition for {connection}: {from} -> {to}")]
    InvalidTransition {
        /// Connection whose state was being changed.
        connection: String,
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },
}

/// Errors raised while validating configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two connections share the same configured name.
    #[error("duplicate connection name: {0}")]
    DuplicateName(String),

    /// Two connections resolve to the same identifier.
    #[error("duplicate connection id: {0}")]
    DuplicateConnection(String),

    /// A required builder field was not set.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A CompID exceeds the maximum length.
    #[error("invalid comp id: {0}")]
    InvalidCompId(String),

    /// The engine was built without a transport.
    #[error("no transport configured")]
    MissingTransport,

    /// Sink capacity must be at least one message.
    #[error("sink capacity must be greater than zero")]
    ZeroSinkCapacity,
}

/// Errors reported by the transport when handing off a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No live session exists for the connection.
    #[error("not connected")]
    NotConnected,

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}
