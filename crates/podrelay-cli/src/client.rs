//! Connection to the relay daemon.
//!
//! A [`RelayClient`] wraps one socket connection. Pushed notifications are
//! read with [`RelayClient::next_message`]; command bytes go out through
//! [`RelayClient::send_raw`] and reach the device unchanged.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::debug;

use podrelay_protocol::{decode_line, PushMessage, MAX_LINE_LENGTH};

use crate::error::{ClientError, Result};

/// Client for one daemon connection.
pub struct RelayClient {
    path: PathBuf,
    lines: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: OwnedWriteHalf,
}

impl RelayClient {
    /// Connects to the daemon socket.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let stream = UnixStream::connect(&path)
            .await
            .map_err(|e| ClientError::DaemonConnection {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        debug!(socket = %path.display(), "Connected to daemon");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            path,
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH)),
            writer,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Waits for the next pushed message.
    ///
    /// Returns `Ok(None)` once the daemon closes the connection.
    pub async fn next_message(&mut self) -> Result<Option<PushMessage>> {
        loop {
            match self.lines.next().await {
                None => return Ok(None),
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => {
                    return decode_line(&line)
                        .map(Some)
                        .map_err(|e| ClientError::Protocol(e.to_string()));
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
                Some(Err(e)) => return Err(ClientError::Protocol(e.to_string())),
            }
        }
    }

    /// Writes raw command bytes; the daemon forwards them to the device.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        debug!(len = bytes.len(), "Sent command bytes");
        Ok(())
    }

    /// Closes the sending direction; pushed messages can still be read.
    pub async fn finish(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Decodes a hex command such as `"04 00 04 00 09 00 0d 01"`.
///
/// Whitespace and `:` separators are ignored.
pub fn parse_hex_command(text: &str) -> Result<Vec<u8>> {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    if compact.is_empty() {
        return Err(ClientError::InvalidHex("empty command".to_string()));
    }
    hex::decode(&compact).map_err(|e| ClientError::InvalidHex(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixListener;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    #[test]
    fn test_parse_hex_command() {
        assert_eq!(
            parse_hex_command("04 00 04:00").unwrap(),
            vec![0x04, 0x00, 0x04, 0x00]
        );
        assert!(matches!(
            parse_hex_command("0"),
            Err(ClientError::InvalidHex(_))
        ));
        assert!(matches!(
            parse_hex_command("  "),
            Err(ClientError::InvalidHex(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let result = RelayClient::connect(dir.path().join("none.sock")).await;
        assert!(matches!(result, Err(ClientError::DaemonConnection { .. })));
    }

    #[tokio::test]
    async fn test_reads_messages_and_sends_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(b"{\"type\":\"anc\",\"mode\":1}\n\n{\"type\":\"ca\",\"status\":0}\n")
                .await
                .unwrap();
            let mut received = [0u8; 3];
            stream.read_exact(&mut received).await.unwrap();
            received
        });

        let mut client = RelayClient::connect(&path).await.unwrap();
        assert_eq!(client.socket_path(), path.as_path());

        let first = timeout(TEST_TIMEOUT, client.next_message()).await.unwrap().unwrap();
        assert_eq!(first, Some(PushMessage::Anc { mode: 1 }));
        let second = timeout(TEST_TIMEOUT, client.next_message()).await.unwrap().unwrap();
        assert_eq!(second, Some(PushMessage::ConversationalAwareness { status: 0 }));

        client.send_raw(&[1, 2, 3]).await.unwrap();
        assert_eq!(server.await.unwrap(), [1, 2, 3]);

        // Server side dropped: stream ends cleanly
        let end = timeout(TEST_TIMEOUT, client.next_message()).await.unwrap().unwrap();
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_invalid_line_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");
        let listener = UnixListener::bind(&path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"not json\n").await.unwrap();
        });

        let mut client = RelayClient::connect(&path).await.unwrap();
        let result = timeout(TEST_TIMEOUT, client.next_message()).await.unwrap();
        assert!(matches!(result, Err(ClientError::Protocol(_))));
    }
}
