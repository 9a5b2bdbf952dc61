/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound transport seam.
//!
//! The engine never encodes or writes bytes itself; it hands each outbound
//! message to a [`Transport`] and gets back the message as it was sent.

use async_trait::async_trait;
use ironlink_core::connection::ConnectionId;
use ironlink_core::error::{LinkError, TransportError};
use ironlink_core::message::Message;

/// Hands messages to the session layer for transmission.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmits `message` on `connection`.
    ///
    /// Returns the message as sent, with header fields such as MsgSeqNum (34)
    /// stamped by the session layer.
    ///
    /// # Errors
    /// Returns a [`TransportError`] if there is no live path for the
    /// connection.
    async fn transmit(
        &self,
        connection: &ConnectionId,
        message: Message,
    ) -> Result<Message, TransportError>;
}

/// Maps a transport failure on a registered connection to [`LinkError`].
pub(crate) fn unavailable(connection: &ConnectionId, err: TransportError) -> LinkError {
    LinkError::TransportUnavailable {
        connection: connection.clone(),
        reason: err.to_string(),
    }
}
