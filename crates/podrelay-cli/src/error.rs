//! Error types for the podrelay client.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` in this module.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The daemon socket could not be reached.
    ///
    /// Usually the daemon is not running, or is listening elsewhere.
    #[error("Failed to connect to daemon at {path}: {reason} (is podrelayd running?)")]
    DaemonConnection { path: PathBuf, reason: String },

    /// A pushed line was not a valid message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Reading or writing the socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A command argument was not valid hex.
    #[error("Invalid hex command: {0}")]
    InvalidHex(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
