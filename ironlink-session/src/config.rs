/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Connection and engine configuration.
//!
//! Plain structs with builders. Loading them from files is left to the caller;
//! every type here deserializes with serde so any loader can produce them.

use ironlink_core::connection::{ConnectionId, ConnectionRole};
use ironlink_core::error::ConfigError;
use ironlink_core::types::CompId;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Default BeginString when none is configured.
pub const DEFAULT_BEGIN_STRING: &str = "FIX.4.4";

/// Handshake credentials (Username 553 / Password 554).
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Username (tag 553).
    pub username: String,
    /// Password (tag 554).
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Static configuration of one connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Unique human-readable name used for lookups.
    pub name: String,
    /// Connection identifier.
    pub connection_id: ConnectionId,
    /// Dialing or listening, single or multi threaded.
    pub role: ConnectionRole,
    /// Credentials presented (dialing) or expected (listening).
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl ConnectionConfig {
    /// Creates a configuration without credentials.
    #[must_use]
    pub fn new(name: impl Into<String>, connection_id: ConnectionId, role: ConnectionRole) -> Self {
        Self {
            name: name.into(),
            connection_id,
            role,
            credentials: None,
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Default)]
pub struct ConnectionConfigBuilder {
    name: Option<String>,
    begin_string: Option<String>,
    sender_comp_id: Option<String>,
    target_comp_id: Option<String>,
    sender_sub_id: Option<String>,
    target_sub_id: Option<String>,
    qualifier: Option<String>,
    role: Option<ConnectionRole>,
    credentials: Option<Credentials>,
}

impl ConnectionConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the BeginString.
    #[must_use]
    pub fn begin_string(mut self, version: impl Into<String>) -> Self {
        self.begin_string = Some(version.into());
        self
    }

    /// Sets the SenderCompID.
    #[must_use]
    pub fn sender_comp_id(mut self, id: &str) -> Self {
        self.sender_comp_id = Some(id.to_string());
        self
    }

    /// Sets the TargetCompID.
    #[must_use]
    pub fn target_comp_id(mut self, id: &str) -> Self {
        self.target_comp_id = Some(id.to_string());
        self
    }

    /// Sets the SenderSubID.
    #[must_use]
    pub fn sender_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.sender_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the TargetSubID.
    #[must_use]
    pub fn target_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.target_sub_id = Some(sub_id.into());
        self
    }

    /// Sets the qualifier.
    #[must_use]
    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Sets the role.
    #[must_use]
    pub const fn role(mut self, role: ConnectionRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Builds the configuration.
    ///
    /// The name defaults to the connection identifier's display form.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingField`] if a CompID or the role is unset,
    /// and [`ConfigError::InvalidCompId`] if a CompID is empty or too long.
    pub fn build(self) -> Result<ConnectionConfig, ConfigError> {
        let sender = self
            .sender_comp_id
            .ok_or(ConfigError::MissingField("sender_comp_id"))?;
        let target = self
            .target_comp_id
            .ok_or(ConfigError::MissingField("target_comp_id"))?;
        let role = self.role.ok_or(ConfigError::MissingField("role"))?;

        for comp_id in [&sender, &target] {
            if comp_id.is_empty() || CompId::new(comp_id).is_none() {
                return Err(ConfigError::InvalidCompId(comp_id.clone()));
            }
        }

        let begin_string = self
            .begin_string
            .unwrap_or_else(|| DEFAULT_BEGIN_STRING.to_string());
        let mut connection_id = ConnectionId::new(begin_string, sender, target);
        connection_id.sender_sub_id = self.sender_sub_id;
        connection_id.target_sub_id = self.target_sub_id;
        connection_id.qualifier = self.qualifier;

        let name = self.name.unwrap_or_else(|| connection_id.to_string());

        Ok(ConnectionConfig {
            name,
            connection_id,
            role,
            credentials: self.credentials,
        })
    }
}

/// Engine-wide settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// How long startup may take; `None` disables the startup check.
    #[serde(default)]
    pub startup_timeout: Option<Duration>,
    /// Messages buffered per subscription before the oldest is overwritten.
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
}

const fn default_sink_capacity() -> usize {
    ironlink_mux::DEFAULT_SINK_CAPACITY
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            startup_timeout: None,
            sink_capacity: default_sink_capacity(),
        }
    }
}

impl EngineConfig {
    /// Sets the startup timeout.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }

    /// Sets the subscription capacity.
    #[must_use]
    pub const fn with_sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = capacity;
        self
    }

    /// Checks the settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::ZeroSinkCapacity`] if the capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sink_capacity == 0 {
            return Err(ConfigError::ZeroSinkCapacity);
        }
        Ok(())
    }
}
