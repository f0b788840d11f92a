//! Newline framing for pushed messages.

use thiserror::Error;

use crate::message::PushMessage;

/// Longest line a client should accept (64 KiB).
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to serialize message: {0}")]
    Serialize(String),

    #[error("Failed to parse message: {0}")]
    Parse(String),
}

/// Serializes a message as one JSON line, newline included.
pub fn encode_line(msg: &PushMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes =
        serde_json::to_vec(msg).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parses one line (with or without its trailing newline).
pub fn decode_line(line: &str) -> Result<PushMessage, ProtocolError> {
    serde_json::from_str(line.trim_end()).map_err(|e| ProtocolError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_line_terminates_with_newline() {
        let bytes = encode_line(&PushMessage::Anc { mode: 2 }).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);
        assert_eq!(&bytes[..], b"{\"type\":\"anc\",\"mode\":2}\n");
    }

    #[test]
    fn test_decode_line_accepts_trailing_newline() {
        let msg = decode_line("{\"type\":\"ca\",\"status\":0}\n").unwrap();
        assert_eq!(msg, PushMessage::ConversationalAwareness { status: 0 });
    }

    #[test]
    fn test_decode_line_rejects_unknown_type() {
        let err = decode_line("{\"type\":\"volume\",\"level\":3}").unwrap_err();
        assert!(matches!(err, ProtocolError::Parse(_)));
    }
}
