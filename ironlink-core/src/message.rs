/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Decoded messages.
//!
//! This module provides:
//! - [`MsgType`]: Enumeration of the message types the core distinguishes
//! - [`MessageKind`]: Routing classification derived from the message type
//! - [`Message`]: A decoded message with ordered tag/value fields

use crate::field::tags;
use crate::types::SeqNum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message types (tag 35).
///
/// Covers the session-level messages and the request/response pairs the
/// correlation table knows about. Anything else is `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgType {
    /// Heartbeat (0).
    Heartbeat,
    /// Test Request (1).
    TestRequest,
    /// Resend Request (2).
    ResendRequest,
    /// Reject (3).
    Reject,
    /// Sequence Reset (4).
    SequenceReset,
    /// Logout (5).
    Logout,
    /// Execution Report (8).
    ExecutionReport,
    /// Order Cancel Reject (9).
    OrderCancelReject,
    /// Logon (A).
    Logon,
    /// New Order Single (D).
    NewOrderSingle,
    /// New Order List (E).
    NewOrderList,
    /// Order Cancel Request (F).
    OrderCancelRequest,
    /// Order Cancel/Replace Request (G).
    OrderCancelReplaceRequest,
    /// Order Status Request (H).
    OrderStatusRequest,
    /// List Status (N).
    ListStatus,
    /// Quote Request (R).
    QuoteRequest,
    /// Quote (S).
    Quote,
    /// Market Data Request (V).
    MarketDataRequest,
    /// Market Data Snapshot/Full Refresh (W).
    MarketDataSnapshotFullRefresh,
    /// Market Data Incremental Refresh (X).
    MarketDataIncrementalRefresh,
    /// Market Data Request Reject (Y).
    MarketDataRequestReject,
    /// Quote Status Request (a).
    QuoteStatusRequest,
    /// Mass Quote Acknowledgement (b).
    MassQuoteAcknowledgement,
    /// Security Definition Request (c).
    SecurityDefinitionRequest,
    /// Security Definition (d).
    SecurityDefinition,
    /// Security Status Request (e).
    SecurityStatusRequest,
    /// Security Status (f).
    SecurityStatus,
    /// Trading Session Status Request (g).
    TradingSessionStatusRequest,
    /// Trading Session Status (h).
    TradingSessionStatus,
    /// Mass Quote (i).
    MassQuote,
    /// Business Message Reject (j).
    BusinessMessageReject,
    /// Order Mass Cancel Request (q).
    OrderMassCancelRequest,
    /// Order Mass Cancel Report (r).
    OrderMassCancelReport,
    /// Security List Request (x).
    SecurityListRequest,
    /// Security List (y).
    SecurityList,
    /// Request For Positions (AN).
    RequestForPositions,
    /// Request For Positions Ack (AO).
    RequestForPositionsAck,
    /// Position Report (AP).
    PositionReport,
    /// Collateral Inquiry (BB).
    CollateralInquiry,
    /// Collateral Report (BA).
    CollateralReport,
    /// Custom or unknown message type.
    Custom(String),
}

impl std::str::FromStr for MsgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "8" => Self::ExecutionReport,
            "9" => Self::OrderCancelReject,
            "A" => Self::Logon,
            "D" => Self::NewOrderSingle,
            "E" => Self::NewOrderList,
            "F" => Self::OrderCancelRequest,
            "G" => Self::OrderCancelReplaceRequest,
            "H" => Self::OrderStatusRequest,
            "N" => Self::ListStatus,
            "R" => Self::QuoteRequest,
            "S" => Self::Quote,
            "V" => Self::MarketDataRequest,
            "W" => Self::MarketDataSnapshotFullRefresh,
            "X" => Self::MarketDataIncrementalRefresh,
            "Y" => Self::MarketDataRequestReject,
            "a" => Self::QuoteStatusRequest,
            "b" => Self::MassQuoteAcknowledgement,
            "c" => Self::SecurityDefinitionRequest,
            "d" => Self::SecurityDefinition,
            "e" => Self::SecurityStatusRequest,
            "f" => Self::SecurityStatus,
            "g" => Self::TradingSessionStatusRequest,
            "h" => Self::TradingSessionStatus,
            "i" => Self::MassQuote,
            "j" => Self::BusinessMessageReject,
            "q" => Self::OrderMassCancelRequest,
            "r" => Self::OrderMassCancelReport,
            "x" => Self::SecurityListRequest,
            "y" => Self::SecurityList,
            "AN" => Self::RequestForPositions,
            "AO" => Self::RequestForPositionsAck,
            "AP" => Self::PositionReport,
            "BB" => Self::CollateralInquiry,
            "BA" => Self::CollateralReport,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the tag 35 value of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::ExecutionReport => "8",
            Self::OrderCancelReject => "9",
            Self::Logon => "A",
            Self::NewOrderSingle => "D",
            Self::NewOrderList => "E",
            Self::OrderCancelRequest => "F",
            Self::OrderCancelReplaceRequest => "G",
            Self::OrderStatusRequest => "H",
            Self::ListStatus => "N",
            Self::QuoteRequest => "R",
            Self::Quote => "S",
            Self::MarketDataRequest => "V",
            Self::MarketDataSnapshotFullRefresh => "W",
            Self::MarketDataIncrementalRefresh => "X",
            Self::MarketDataRequestReject => "Y",
            Self::QuoteStatusRequest => "a",
            Self::MassQuoteAcknowledgement => "b",
            Self::SecurityDefinitionRequest => "c",
            Self::SecurityDefinition => "d",
            Self::SecurityStatusRequest => "e",
            Self::SecurityStatus => "f",
            Self::TradingSessionStatusRequest => "g",
            Self::TradingSessionStatus => "h",
            Self::MassQuote => "i",
            Self::BusinessMessageReject => "j",
            Self::OrderMassCancelRequest => "q",
            Self::OrderMassCancelReport => "r",
            Self::SecurityListRequest => "x",
            Self::SecurityList => "y",
            Self::RequestForPositions => "AN",
            Self::RequestForPositionsAck => "AO",
            Self::PositionReport => "AP",
            Self::CollateralInquiry => "BB",
            Self::CollateralReport => "BA",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns the routing classification of this message type.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        MessageKind::of(self)
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an inbound message is routed by the connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Heartbeat, TestRequest, ResendRequest, SequenceReset.
    Keepalive,
    /// Logon.
    Handshake,
    /// Logout.
    Logout,
    /// Session Reject (3) or BusinessMessageReject (j).
    Reject,
    /// Everything else.
    Application,
}

impl MessageKind {
    /// Classifies a message type.
    #[must_use]
    pub fn of(msg_type: &MsgType) -> Self {
        match msg_type {
            MsgType::Heartbeat
            | MsgType::TestRequest
            | MsgType::ResendRequest
            | MsgType::SequenceReset => Self::Keepalive,
            MsgType::Logon => Self::Handshake,
            MsgType::Logout => Self::Logout,
            MsgType::Reject | MsgType::BusinessMessageReject => Self::Reject,
            _ => Self::Application,
        }
    }

    /// Returns true for kinds that are forwarded to correlated waiters.
    #[must_use]
    pub const fn is_routable(self) -> bool {
        matches!(self, Self::Application | Self::Reject)
    }
}

/// A decoded message.
///
/// Fields keep their arrival order; setting a field that is already present
/// replaces its first occurrence in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The message type (tag 35).
    msg_type: MsgType,
    /// Body and header fields as (tag, value) pairs, tag 35 excluded.
    fields: Vec<(u32, String)>,
}

impl Message {
    /// Creates an empty message of the given type.
    #[must_use]
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            fields: Vec::new(),
        }
    }

    /// Builder-style [`Message::set_field`].
    #[must_use]
    pub fn with_field(mut self, tag: u32, value: impl Into<String>) -> Self {
        self.set_field(tag, value);
        self
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns the routing classification.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.msg_type.kind()
    }

    /// Sets a field, replacing the first existing occurrence of `tag`.
    pub fn set_field(&mut self, tag: u32, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((tag, value)),
        }
    }

    /// Removes every occurrence of `tag`, returning the first removed value.
    pub fn remove_field(&mut self, tag: u32) -> Option<String> {
        let position = self.fields.iter().position(|(t, _)| *t == tag)?;
        let (_, value) = self.fields.remove(position);
        self.fields.retain(|(t, _)| *t != tag);
        Some(value)
    }

    /// Returns true if `tag` is present.
    #[must_use]
    pub fn has_field(&self, tag: u32) -> bool {
        self.fields.iter().any(|(t, _)| *t == tag)
    }

    /// Gets the first value of `tag`.
    #[must_use]
    pub fn get_field_str(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Gets the first value of `tag` parsed as `T`.
    ///
    /// Returns `None` if the field is absent or does not parse.
    #[must_use]
    pub fn get_field_as<T: std::str::FromStr>(&self, tag: u32) -> Option<T> {
        self.get_field_str(tag).and_then(|v| v.parse().ok())
    }

    /// Returns the MsgSeqNum (tag 34), if stamped.
    #[must_use]
    pub fn seq_num(&self) -> Option<SeqNum> {
        self.get_field_as(tags::MSG_SEQ_NUM)
    }

    /// Returns an iterator over all fields in order.
    pub fn fields(&self) -> impl Iterator<Item = (u32, &str)> {
        self.fields.iter().map(|(t, v)| (*t, v.as_str()))
    }

    /// Returns the number of fields, tag 35 excluded.
    #[inline]
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msg_type_round_trip_codes() {
        assert_eq!("A".parse::<MsgType>().unwrap(), MsgType::Logon);
        assert_eq!("AN".parse::<MsgType>().unwrap(), MsgType::RequestForPositions);
        assert_eq!(MsgType::BusinessMessageReject.as_str(), "j");

        let custom: MsgType = "U1".parse().unwrap();
        assert_eq!(custom, MsgType::Custom("U1".to_string()));
        assert_eq!(custom.as_str(), "U1");
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(MsgType::Heartbeat.kind(), MessageKind::Keepalive);
        assert_eq!(MsgType::SequenceReset.kind(), MessageKind::Keepalive);
        assert_eq!(MsgType::Logon.kind(), MessageKind::Handshake);
        assert_eq!(MsgType::Logout.kind(), MessageKind::Logout);
        assert_eq!(MsgType::Reject.kind(), MessageKind::Reject);
        assert_eq!(MsgType::BusinessMessageReject.kind(), MessageKind::Reject);
        assert_eq!(MsgType::ExecutionReport.kind(), MessageKind::Application);
        assert!(MessageKind::Reject.is_routable());
        assert!(!MessageKind::Keepalive.is_routable());
    }

    #[test]
    fn test_set_field_replaces_in_place() {
        let mut msg = Message::new(MsgType::Logon)
            .with_field(tags::TEXT, "hello")
            .with_field(tags::USERNAME, "old");
        msg.set_field(tags::USERNAME, "new");

        assert_eq!(msg.get_field_str(tags::USERNAME), Some("new"));
        assert_eq!(msg.field_count(), 2);
        let order: Vec<u32> = msg.fields().map(|(t, _)| t).collect();
        assert_eq!(order, vec![tags::TEXT, tags::USERNAME]);
    }

    #[test]
    fn test_seq_num_and_typed_access() {
        let msg = Message::new(MsgType::ExecutionReport)
            .with_field(tags::MSG_SEQ_NUM, "17")
            .with_field(tags::TEXT, "filled");

        assert_eq!(msg.seq_num(), Some(SeqNum::new(17)));
        assert_eq!(msg.get_field_as::<u64>(tags::TEXT), None);
        assert!(msg.has_field(tags::TEXT));
        assert_eq!(msg.get_field_str(999), None);
    }

    #[test]
    fn test_remove_field() {
        let mut msg = Message::new(MsgType::Logon).with_field(tags::PASSWORD, "secret");
        assert_eq!(msg.remove_field(tags::PASSWORD), Some("secret".to_string()));
        assert_eq!(msg.remove_field(tags::PASSWORD), None);
        assert!(!msg.has_field(tags::PASSWORD));
    }
}
