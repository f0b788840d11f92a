//! Unix-socket bridge to an external protocol decoder.
//!
//! The bridge process owns the Bluetooth link and the packet decoding. It
//! writes one JSON-encoded [`NotificationRecord`] per line and accepts raw
//! protocol bytes in the other direction.

use std::path::PathBuf;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, error, info, warn};

use podrelay_core::NotificationRecord;

use crate::{DeviceError, DeviceEvents, DeviceLink};

/// Capacity of the notification channel handed to the daemon.
pub const EVENT_BUFFER: usize = 64;

/// Longest event line accepted from the bridge.
const MAX_EVENT_LINE: usize = 64 * 1024;

/// Label given to bridge lines that do not parse as a record.
const UNPARSED_LABEL: &str = "unparsed bridge line";

/// Device link backed by a protocol bridge listening on a Unix socket.
pub struct BridgeDevice {
    path: PathBuf,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl BridgeDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DeviceLink for BridgeDevice {
    async fn connect(&self) -> Result<DeviceEvents, DeviceError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| DeviceError::Unreachable {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        let (reader, writer) = stream.into_split();
        *self.writer.lock().await = Some(writer);

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let path = self.path.clone();

        tokio::spawn(async move {
            let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_EVENT_LINE));

            while let Some(line) = lines.next().await {
                let record = match line {
                    Ok(line) => parse_event_line(&line),
                    Err(e) => {
                        error!(bridge = %path.display(), error = %e, "Bridge read failed");
                        break;
                    }
                };

                let Some(record) = record else {
                    continue;
                };

                debug!(category = %record.category(), "Bridge event");

                if event_tx.send(record).await.is_err() {
                    debug!("Event receiver dropped, stopping bridge reader");
                    break;
                }
            }

            warn!(bridge = %path.display(), "Bridge event stream ended");
        });

        info!(bridge = %self.path.display(), "Connected to device bridge");
        Ok(event_rx)
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), DeviceError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(DeviceError::NotConnected)?;

        writer
            .write_all(bytes)
            .await
            .map_err(|e| DeviceError::Io(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| DeviceError::Io(e.to_string()))?;

        debug!(len = bytes.len(), "Sent bytes to device");
        Ok(())
    }
}

/// Decodes one bridge line.
///
/// Blank lines yield nothing. Lines that are not a valid record are kept as
/// `Unknown` with the raw line as payload, so nothing the bridge says is lost.
fn parse_event_line(line: &str) -> Option<NotificationRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str(trimmed) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(error = %e, "Unparsed bridge line kept as unknown");
            Some(NotificationRecord::unknown(UNPARSED_LABEL, trimmed.as_bytes()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn test_parse_event_line_valid() {
        let record = parse_event_line(r#"{"category":"anc","mode":3}"#);
        assert_eq!(record, Some(NotificationRecord::anc(3)));
    }

    #[test]
    fn test_parse_event_line_blank() {
        assert_eq!(parse_event_line("   "), None);
    }

    #[test]
    fn test_parse_event_line_garbage_kept_as_unknown() {
        let record = parse_event_line("not json").unwrap();
        assert_eq!(
            record,
            NotificationRecord::unknown(UNPARSED_LABEL, b"not json".to_vec())
        );
    }

    #[test]
    fn test_parse_event_line_out_of_range_battery_kept_as_unknown() {
        let line = r#"{"category":"battery","entries":[{"component":"LEFT","status":"CHARGING","level":250}]}"#;
        assert_eq!(
            parse_event_line(line),
            Some(NotificationRecord::unknown(UNPARSED_LABEL, line.as_bytes()))
        );
    }

    #[tokio::test]
    async fn test_connect_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let device = BridgeDevice::new(dir.path().join("missing.sock"));

        match device.connect().await {
            Err(DeviceError::Unreachable { path, .. }) => {
                assert!(path.ends_with("missing.sock"));
            }
            other => panic!("Expected Unreachable, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let device = BridgeDevice::new("/nonexistent/bridge.sock");
        assert!(matches!(
            device.send(b"\x01").await,
            Err(DeviceError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_bridge_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let device = BridgeDevice::new(&path);
        let (connect_result, accepted) = tokio::join!(device.connect(), listener.accept());
        let mut events = connect_result.unwrap();
        let (bridge_side, _) = accepted.unwrap();
        let (mut bridge_reader, mut bridge_writer) = bridge_side.into_split();

        bridge_writer
            .write_all(b"{\"category\":\"conversational_awareness\",\"status\":1}\n")
            .await
            .unwrap();

        let record = timeout(RECV_TIMEOUT, events.recv()).await.unwrap().unwrap();
        assert_eq!(record, NotificationRecord::conversational_awareness(1));

        device.send(&[0x04, 0x00, 0x04, 0x00]).await.unwrap();

        let mut received = [0u8; 4];
        timeout(RECV_TIMEOUT, bridge_reader.read_exact(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, [0x04, 0x00, 0x04, 0x00]);

        // Closing the bridge ends the event stream
        drop(bridge_writer);
        let end = timeout(RECV_TIMEOUT, events.recv()).await.unwrap();
        assert!(end.is_none());
    }
}
