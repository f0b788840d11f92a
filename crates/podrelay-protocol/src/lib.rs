//! podrelay Protocol - Wire format between the daemon and local clients
//!
//! Daemon → client: one JSON object per delivered notification, each
//! followed by a newline. Client → daemon: raw bytes, passed to the
//! device untouched, so there is nothing to model in that direction.

pub mod frame;
pub mod message;

pub use frame::{decode_line, encode_line, ProtocolError, MAX_LINE_LENGTH};
pub use message::{hex_dump, ComponentBattery, PushMessage};

/// Default path of the daemon's client socket, shared by daemon and clients.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/podrelay.sock";
