/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronLink Mux
//!
//! Correlation multiplexing for the IronLink engine.
//!
//! Many independent request/response exchanges share one connection. Each
//! waiter registers a [`Sink`] holding a correlation rule; every inbound
//! message is offered to every active sink of its connection and delivered to
//! those whose rule matches.
//!
//! This crate provides:
//! - **Correlation rules**: Predicates derived from a sent request
//! - **Sinks**: Registered waiters with message and error callbacks
//! - **Subscriptions**: Keep-newest bounded delivery streams over a sink
//! - **Multiplexer**: Per-connection sink set with broadcast-then-freeze drop handling

pub mod multiplexer;
pub mod rule;
pub mod sink;
pub mod stream;

pub use multiplexer::{DEFAULT_SINK_CAPACITY, Multiplexer};
pub use rule::{
    CorrelationRule, ReferenceMapping, ReferenceRule, ReferenceRuleFactory, RuleFactory,
    SecondaryComparison, SharedRule, match_cl_ord_id, match_field, match_msg_type,
};
pub use sink::{Sink, SinkCallbacks, SinkHandle, SinkId};
pub use stream::{RecvError, Subscription};
