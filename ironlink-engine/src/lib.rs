/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronLink Engine
//!
//! High-level engine facade for correlated messaging.
//!
//! This crate provides:
//! - **Engine**: Send a request and receive its correlated replies as a stream
//! - **Registry**: Lookup of connection handlers by identifier or name
//! - **Application trait**: Callback interface the transport drives
//! - **Transport trait**: Seam to the session layer that puts messages on the wire
//! - **Builder API**: Fluent configuration for engine setup

pub mod application;
pub mod builder;
pub mod engine;
pub mod handler;
pub mod registry;
pub mod transport;

pub use application::{Application, RejectReason};
pub use builder::EngineBuilder;
pub use engine::Engine;
pub use handler::ConnectionHandler;
pub use registry::ConnectionRegistry;
pub use transport::Transport;
