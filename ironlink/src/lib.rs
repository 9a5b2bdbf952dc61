/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronLink
//!
//! Correlated request/response messaging over long-lived FIX sessions.
//!
//! Many independent exchanges share one connection per counterparty. Each
//! send registers a waiter whose correlation rule is derived from the sent
//! request; inbound messages are fanned out to every matching waiter. When a
//! connection drops, every waiter (present and future) is failed until the
//! connection is re-established.
//!
//! ## Features
//!
//! - **Correlation**: Reference-field and RefSeqNum matching with a pluggable table
//! - **Non-blocking delivery**: Bounded keep-newest buffers per waiter
//! - **Lifecycle**: Runtime-checked connection state machine with authentication
//! - **Startup barrier**: Wait until every configured connection is ready
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ironlink::prelude::*;
//!
//! let engine = EngineBuilder::new()
//!     .with_transport(MyTransport)
//!     .add_connection(
//!         ConnectionConfigBuilder::new()
//!             .name("broker")
//!             .sender_comp_id("CLIENT")
//!             .target_comp_id("BROKER")
//!             .role(ConnectionRole::DialingMultiThreaded)
//!             .build()?,
//!     )
//!     .build()?;
//!
//! let mut replies = engine.send_and_correlate(&id, order).await?;
//! let report = replies.recv().await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Messages, identifiers, and error definitions
//! - [`mux`]: Correlation rules, sinks, and the multiplexer
//! - [`session`]: Connection lifecycle, authentication, and startup barrier
//! - [`engine`]: High-level engine facade

pub mod core {
    //! Messages, identifiers, and error definitions.
    pub use ironlink_core::*;
}

pub mod mux {
    //! Correlation rules, sinks, and the multiplexer.
    pub use ironlink_mux::*;
}

pub mod session {
    //! Connection lifecycle, authentication, and startup barrier.
    pub use ironlink_session::*;
}

pub mod engine {
    //! High-level engine facade.
    pub use ironlink_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use ironlink_core::{
        CompId, ConfigError, ConnectionDropped, ConnectionId, ConnectionRole, DropCause,
        LinkError, Message, MessageKind, MsgType, Result, SeqNum, Timestamp, TransportError,
        tags,
    };

    // Correlation
    pub use ironlink_mux::{
        CorrelationRule, Multiplexer, RecvError, ReferenceMapping, ReferenceRuleFactory,
        RuleFactory, SharedRule, SinkCallbacks, SinkHandle, Subscription, match_cl_ord_id,
        match_field, match_msg_type,
    };

    // Session
    pub use ironlink_session::{
        ConnectionConfig, ConnectionConfigBuilder, ConnectionState, Credentials, EngineConfig,
        StartupBarrier,
    };

    // Engine
    pub use ironlink_engine::{Application, Engine, EngineBuilder, RejectReason, Transport};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _seq = SeqNum::new(1);
        let _ts = Timestamp::now();
        let id = ConnectionId::new("FIX.4.4", "SENDER", "TARGET");
        assert_eq!(id.to_string(), "FIX.4.4:SENDER->TARGET");
    }

    #[test]
    fn test_default_rule_table() {
        let factory = ReferenceRuleFactory::new();
        let request = Message::new(MsgType::NewOrderSingle).with_field(tags::CL_ORD_ID, "REQ-1");
        let rule = factory.rule_for(&request);

        let reply = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "REQ-1");
        let other = Message::new(MsgType::ExecutionReport).with_field(tags::CL_ORD_ID, "REQ-2");
        assert!(rule.matches(&reply));
        assert!(!rule.matches(&other));
    }
}
