//! Query surface of the oracle
//!
//! - `protocol.rs` - command parsing and JSON response rendering
//! - `server.rs`   - TCP listener, one command per connection
//! - `client.rs`   - client for the same protocol

pub mod client;
pub mod protocol;
pub mod server;

pub use client::OracleClient;
pub use protocol::{Command, NO_ACTIVE_PROOF, QueryContext, UNKNOWN_COMMAND, respond};
pub use server::{OracleProtocolServer, ProtocolConfig};
