//! podrelay client - talks to a running podrelay daemon
//!
//! - `client` - connection, pushed-message stream and command sending
//! - `cli` - the `podrelay` command line

pub mod cli;
pub mod client;
pub mod error;

pub use client::RelayClient;
pub use podrelay_protocol::DEFAULT_SOCKET_PATH;
pub use error::{ClientError, Result};
