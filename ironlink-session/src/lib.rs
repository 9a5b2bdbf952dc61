/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # IronLink Session
//!
//! Connection lifecycle layer for the IronLink engine.
//!
//! This crate provides:
//! - **State machine**: Runtime-checked created/authenticating/established/dropped lifecycle
//! - **Authentication**: Credential injection for dialing roles, validation for listening roles
//! - **Startup barrier**: Countdown over configured connections with timeout
//! - **Configuration**: Connection, credential, and engine settings

pub mod barrier;
pub mod config;
pub mod lifecycle;
pub mod state;

pub use barrier::StartupBarrier;
pub use config::{ConnectionConfig, ConnectionConfigBuilder, Credentials, EngineConfig};
pub use lifecycle::ConnectionLifecycle;
pub use state::ConnectionState;
