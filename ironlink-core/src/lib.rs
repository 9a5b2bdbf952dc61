/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronLink Core
//!
//! Core types and error definitions shared by every IronLink crate.
//!
//! This crate provides:
//! - **Error types**: Unified error handling with `thiserror`
//! - **Connection identity**: `ConnectionId` and `ConnectionRole`
//! - **Message types**: the decoded `Message`, `MsgType`, and `MessageKind`
//! - **Field tags**: the tag numbers the session core reads and writes
//! - **Core types**: `SeqNum`, `Timestamp`, `CompId`
//!
//! Wire encoding is not part of IronLink. Messages arrive here already decoded
//! by the protocol engine and leave as field maps for it to encode.

pub mod connection;
pub mod error;
pub mod field;
pub mod message;
pub mod types;

pub use connection::{ConnectionId, ConnectionRole, ReadinessEvent};
pub use error::{
    ConfigError, ConnectionDropped, DropCause, LinkError, Result, SessionError, TransportError,
};
pub use field::tags;
pub use message::{Message, MessageKind, MsgType};
pub use types::{CompId, SeqNum, Timestamp};
