/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Application callback interface.
//!
//! The transport drives each connection through these callbacks, following
//! the QuickFIX pattern with async support. [`crate::Engine`] implements it.

use async_trait::async_trait;
use ironlink_core::connection::ConnectionId;
use ironlink_core::error::LinkError;
use ironlink_core::field::tags;
use ironlink_core::message::Message;

/// SessionRejectReason (373) value "Other".
pub const REJECT_REASON_OTHER: u32 = 99;

/// Reason for rejecting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectReason {
    /// Rejection reason code.
    pub code: u32,
    /// Human-readable rejection text.
    pub text: String,
    /// Reference tag that caused the rejection.
    pub ref_tag: Option<u32>,
}

impl RejectReason {
    /// Creates a new rejection reason.
    #[must_use]
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            ref_tag: None,
        }
    }

    /// Sets the reference tag.
    #[must_use]
    pub const fn with_ref_tag(mut self, tag: u32) -> Self {
        self.ref_tag = Some(tag);
        self
    }
}

impl From<LinkError> for RejectReason {
    fn from(err: LinkError) -> Self {
        let reason = Self::new(REJECT_REASON_OTHER, err.to_string());
        match err {
            LinkError::AuthenticationRejected { .. } => reason.with_ref_tag(tags::USERNAME),
            _ => reason,
        }
    }
}

/// Application callback interface for connection events and messages.
///
/// Callbacks for one connection are invoked in order by its transport.
#[async_trait]
pub trait Application: Send + Sync {
    /// Called when a session is created.
    ///
    /// # Arguments
    /// * `connection` - The connection identifier
    async fn on_create(&self, connection: &ConnectionId);

    /// Called on successful logon.
    ///
    /// # Arguments
    /// * `connection` - The connection identifier
    async fn on_logon(&self, connection: &ConnectionId);

    /// Called on logout or disconnect.
    ///
    /// # Arguments
    /// * `connection` - The connection identifier
    async fn on_logout(&self, connection: &ConnectionId);

    /// Called before sending an admin message.
    ///
    /// Allows modification of outgoing admin messages (Logon, Logout, etc.).
    ///
    /// # Returns
    /// `Ok(())` to send, `Err(RejectReason)` to suppress.
    async fn to_admin(
        &self,
        message: &mut Message,
        connection: &ConnectionId,
    ) -> Result<(), RejectReason>;

    /// Called when an admin message is received.
    ///
    /// # Returns
    /// `Ok(())` to accept, `Err(RejectReason)` to reject.
    #[allow(clippy::wrong_self_convention)]
    async fn from_admin(
        &self,
        message: &Message,
        connection: &ConnectionId,
    ) -> Result<(), RejectReason>;

    /// Called before sending an application message.
    ///
    /// # Returns
    /// `Ok(())` to send, `Err(RejectReason)` to suppress.
    async fn to_app(
        &self,
        message: &mut Message,
        connection: &ConnectionId,
    ) -> Result<(), RejectReason>;

    /// Called when an application message is received.
    ///
    /// # Returns
    /// `Ok(())` to accept, `Err(RejectReason)` to reject.
    #[allow(clippy::wrong_self_convention)]
    async fn from_app(&self, message: &Message, connection: &ConnectionId)
    -> Result<(), RejectReason>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason() {
        let reason = RejectReason::new(1, "Invalid tag").with_ref_tag(35);
        assert_eq!(reason.code, 1);
        assert_eq!(reason.text, "Invalid tag");
        assert_eq!(reason.ref_tag, Some(35));
    }

    #[test]
    fn test_reject_reason_from_error() {
        let err = LinkError::AuthenticationRejected {
            connection: ConnectionId::new("FIX.4.4", "A", "B"),
            reason: "credentials mismatch".to_string(),
        };
        let reason = RejectReason::from(err);
        assert_eq!(reason.code, REJECT_REASON_OTHER);
        assert_eq!(reason.ref_tag, Some(tags::USERNAME));
        assert!(reason.text.contains("credentials mismatch"));
    }
}
