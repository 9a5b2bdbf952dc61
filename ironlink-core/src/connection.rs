/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Connection identity and role.
//!
//! A [`ConnectionId`] names one logical, long-lived link to a counterparty and
//! is the key every per-connection table is indexed by. A [`ConnectionRole`]
//! says which side opens the link, which in turn decides who presents and who
//! validates credentials and which lifecycle event counts as "ready".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one logical connection.
///
/// Equality and hashing are structural over every component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId {
    /// BeginString (protocol version), e.g. `FIX.4.4`.
    pub begin_string: String,
    /// Local SenderCompID.
    pub sender_comp_id: String,
    /// Remote TargetCompID.
    pub target_comp_id: String,
    /// Optional SenderSubID.
    #[serde(default)]
    pub sender_sub_id: Option<String>,
    /// Optional TargetSubID.
    #[serde(default)]
    pub target_sub_id: Option<String>,
    /// Optional qualifier distinguishing otherwise identical connections.
    #[serde(default)]
    pub qualifier: Option<String>,
}

impl ConnectionId {
    /// Creates a new connection ID.
    #[must_use]
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: impl Into<String>,
        target_comp_id: impl Into<String>,
    ) -> Self {
        Self {
            begin_string: begin_string.into(),
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            sender_sub_id: None,
            target_sub_id: None,
            qualifier: None,
        }
    }

    /// Sets the sender sub ID.
    #[must_use]
    pub fn with_sender_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.sender_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the target sub ID.
    #[must_use]
    pub fn with_target_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.target_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the session qualifier.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.begin_string, self.sender_comp_id)?;
        if let Some(sub_id) = &self.sender_sub_id {
            write!(f, "/{sub_id}")?;
        }
        write!(f, "->{}", self.target_comp_id)?;
        if let Some(sub_id) = &self.target_sub_id {
            write!(f, "/{sub_id}")?;
        }
        if let Some(qualifier) = &self.qualifier {
            write!(f, ":{qualifier}")?;
        }
        Ok(())
    }
}

/// The lifecycle event that marks a connection as ready at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessEvent {
    /// The session object was created (listening side).
    Created,
    /// The handshake completed (dialing side).
    Established,
}

/// How a connection is opened and serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionRole {
    /// Initiator sharing one thread across sessions.
    DialingSingleThreaded,
    /// Initiator with one thread per session.
    DialingMultiThreaded,
    /// Acceptor sharing one thread across sessions.
    ListeningSingleThreaded,
    /// Acceptor with one thread per session.
    ListeningMultiThreaded,
}

impl ConnectionRole {
    /// Returns true for initiator roles.
    #[must_use]
    pub const fn is_dialing(self) -> bool {
        matches!(self, Self::DialingSingleThreaded | Self::DialingMultiThreaded)
    }

    /// Returns true for acceptor roles.
    #[must_use]
    pub const fn is_listening(self) -> bool {
        !self.is_dialing()
    }

    /// Returns true if every session gets its own inbound thread.
    #[must_use]
    pub const fn is_multi_threaded(self) -> bool {
        matches!(self, Self::DialingMultiThreaded | Self::ListeningMultiThreaded)
    }

    /// Listening roles validate handshake credentials.
    #[must_use]
    pub const fn validates_credentials(self) -> bool {
        self.is_listening()
    }

    /// Dialing roles present handshake credentials.
    #[must_use]
    pub const fn presents_credentials(self) -> bool {
        self.is_dialing()
    }

    /// The event that counts this connection as ready at startup.
    #[must_use]
    pub const fn readiness_event(self) -> ReadinessEvent {
        if self.is_dialing() {
            ReadinessEvent::Established
        } else {
            ReadinessEvent::Created
        }
    }
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DialingSingleThreaded => "dialing-single-threaded",
            Self::DialingMultiThreaded => "dialing-multi-threaded",
            Self::ListeningSingleThreaded => "listening-single-threaded",
            Self::ListeningMultiThreaded => "listening-multi-threaded",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new("FIX.4.4", "SENDER", "TARGET");
        assert_eq!(id.to_string(), "FIX.4.4:SENDER->TARGET");

        let id = id.with_qualifier("MD");
        assert_eq!(id.to_string(), "FIX.4.4:SENDER->TARGET:MD");
    }

    #[test]
    fn test_connection_id_display_includes_sub_ids() {
        let desk1 = ConnectionId::new("FIX.4.4", "C", "B").with_sender_sub_id("DESK1");
        let desk2 = ConnectionId::new("FIX.4.4", "C", "B").with_sender_sub_id("DESK2");
        assert_eq!(desk1.to_string(), "FIX.4.4:C/DESK1->B");
        assert_ne!(desk1.to_string(), desk2.to_string());

        let both = ConnectionId::new("FIX.4.4", "C", "B")
            .with_sender_sub_id("DESK1")
            .with_target_sub_id("ALGO")
            .with_qualifier("MD");
        assert_eq!(both.to_string(), "FIX.4.4:C/DESK1->B/ALGO:MD");
    }

    #[test]
    fn test_connection_id_structural_key() {
        let mut table = HashMap::new();
        table.insert(ConnectionId::new("FIX.4.4", "A", "B"), 1);
        table.insert(ConnectionId::new("FIX.4.4", "A", "B").with_sender_sub_id("DESK"), 2);

        assert_eq!(table.get(&ConnectionId::new("FIX.4.4", "A", "B")), Some(&1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_role_readiness() {
        assert_eq!(
            ConnectionRole::DialingMultiThreaded.readiness_event(),
            ReadinessEvent::Established
        );
        assert_eq!(
            ConnectionRole::ListeningSingleThreaded.readiness_event(),
            ReadinessEvent::Created
        );
        assert!(ConnectionRole::DialingSingleThreaded.presents_credentials());
        assert!(ConnectionRole::ListeningMultiThreaded.validates_credentials());
        assert!(!ConnectionRole::DialingSingleThreaded.is_multi_threaded());
    }
}
