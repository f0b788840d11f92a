//! Device link errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`crate::DeviceLink`].
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Device unreachable at {path}: {reason}")]
    Unreachable { path: PathBuf, reason: String },

    #[error("Device link is not connected")]
    NotConnected,

    #[error("Device I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_display() {
        let err = DeviceError::Unreachable {
            path: PathBuf::from("/tmp/bridge.sock"),
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("/tmp/bridge.sock"));
        assert!(err.to_string().contains("connection refused"));
    }
}
