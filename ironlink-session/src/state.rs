/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Connection lifecycle states.
//!
//! Unlike a typestate machine, the state of a live connection changes at
//! runtime from callbacks on arbitrary threads, so it is a plain enum and the
//! allowed transitions are checked at runtime.

use ironlink_core::connection::ConnectionId;
use ironlink_core::error::SessionError;
use std::fmt;

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Physical session set up, no handshake yet.
    Created,
    /// Handshake sent or received.
    Authenticating,
    /// Handshake completed; application traffic flows.
    Established,
    /// Disconnected, logged out, or rejected.
    Dropped,
}

impl ConnectionState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Authenticating => "authenticating",
            Self::Established => "established",
            Self::Dropped => "dropped",
        }
    }

    /// Returns true if a transition from `self` to `next` is allowed.
    ///
    /// Re-entering `Created` or `Authenticating` is tolerated (repeated
    /// callbacks from the transport); `Established` only ever moves to
    /// `Dropped`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Authenticating, Created, Dropped, Established};
        matches!(
            (self, next),
            (Created, Created | Authenticating | Dropped)
                | (Authenticating, Authenticating | Established | Dropped)
                | (Established, Dropped)
                | (Dropped, Created | Authenticating | Dropped)
        )
    }

    /// Checks a transition for `connection`.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] if the transition is not
    /// allowed.
    pub fn transition(
        self,
        next: Self,
        connection: &ConnectionId,
    ) -> Result<Self, SessionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SessionError::InvalidTransition {
                connection: connection.to_string(),
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    /// Returns true when application traffic may flow.
    #[must_use]
    pub const fn is_established(self) -> bool {
        matches!(self, Self::Established)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
