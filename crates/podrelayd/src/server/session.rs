//! One client connection and its two legs.
//!
//! ```text
//!                 ┌──────────── ClientSession ────────────┐
//!  NotificationStore ──take_all──▶ push leg ──JSON lines──▶ client
//!  DeviceLink ◀──send(bytes)──── forward leg ◀──raw bytes── client
//!                 └───────────────────────────────────────┘
//! ```
//!
//! The legs run as separate tasks. Each holds a drop guard on the session
//! token, so when either leg ends for any reason the other is cancelled and
//! the session tears down as a unit. The session token is a child of the
//! daemon run state, so shutdown cancels every session too.
//!
//! Failures stay inside the session: the client only sees its connection
//! close, nothing is written on error paths.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use podrelay_device::{DeviceError, DeviceLink};
use podrelay_protocol::{encode_line, ProtocolError, PushMessage};

use crate::shutdown::RunState;
use crate::store::NotificationStore;

/// Identifier of an accepted connection, unique for the daemon's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Per-session tunables.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Forward-leg read chunk size
    pub read_buffer_size: usize,

    /// Bound on writing one pushed message
    pub write_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            read_buffer_size: 1024,
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Errors that end a session leg.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Client read failed: {0}")]
    Read(String),

    #[error("Client write failed: {0}")]
    Write(String),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Device send failed: {0}")]
    Device(#[from] DeviceError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Session leg aborted: {0}")]
    Aborted(String),
}

/// What a session did before it ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Messages written to the client
    pub pushed: u64,

    /// Bytes forwarded to the device
    pub forwarded: u64,
}

/// A connected client.
pub struct ClientSession<S> {
    id: SessionId,
    stream: S,
    store: Arc<NotificationStore>,
    device: Arc<dyn DeviceLink>,
    run_state: RunState,
    settings: SessionSettings,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(
        id: SessionId,
        stream: S,
        store: Arc<NotificationStore>,
        device: Arc<dyn DeviceLink>,
        run_state: RunState,
        settings: SessionSettings,
    ) -> Self {
        Self {
            id,
            stream,
            store,
            device,
            run_state,
            settings,
        }
    }

    /// Runs both legs until the session ends, then closes the connection.
    pub async fn run(self) -> SessionStats {
        let id = self.id;
        debug!(client_id = %id, "Session started");

        let (reader, writer) = tokio::io::split(self.stream);
        let token = self.run_state.child_token();

        let push = tokio::spawn(push_leg(
            id,
            writer,
            self.store,
            token.clone(),
            self.settings.write_timeout,
        ));
        let forward = tokio::spawn(forward_leg(
            id,
            reader,
            self.device,
            token,
            self.settings.read_buffer_size,
        ));

        let (push, forward) = tokio::join!(push, forward);

        let mut stats = SessionStats::default();
        let mut halves = (None, None);

        match push {
            Ok((writer, pushed, result)) => {
                stats.pushed = pushed;
                halves.1 = Some(writer);
                log_leg_end(id, "push", result);
            }
            Err(e) => log_leg_end(id, "push", Err(SessionError::Aborted(e.to_string()))),
        }

        match forward {
            Ok((reader, forwarded, result)) => {
                stats.forwarded = forwarded;
                halves.0 = Some(reader);
                log_leg_end(id, "forward", result);
            }
            Err(e) => log_leg_end(id, "forward", Err(SessionError::Aborted(e.to_string()))),
        }

        // Close exactly once; a half lost to an aborted leg was dropped already
        if let (Some(reader), Some(writer)) = halves {
            let mut stream = reader.unsplit(writer);
            if let Err(e) = stream.shutdown().await {
                debug!(client_id = %id, error = %e, "Error closing client connection");
            }
        }

        info!(
            client_id = %id,
            pushed = stats.pushed,
            forwarded = stats.forwarded,
            "Client disconnected"
        );
        stats
    }
}

fn log_leg_end(id: SessionId, leg: &'static str, result: Result<(), SessionError>) {
    match result {
        Ok(()) => debug!(client_id = %id, leg, "Leg finished"),
        Err(e) => warn!(client_id = %id, leg, error = %e, "Leg failed"),
    }
}

/// Store → client. Drains the store and writes one JSON line per record.
async fn push_leg<S>(
    id: SessionId,
    mut writer: WriteHalf<S>,
    store: Arc<NotificationStore>,
    token: CancellationToken,
    write_timeout: Duration,
) -> (WriteHalf<S>, u64, Result<(), SessionError>)
where
    S: AsyncWrite,
{
    let _sibling = token.clone().drop_guard();
    let mut changes = store.subscribe();
    let mut pushed = 0;

    loop {
        if token.is_cancelled() {
            return (writer, pushed, Ok(()));
        }

        let batch = store.take_all();

        if batch.is_empty() {
            tokio::select! {
                _ = token.cancelled() => return (writer, pushed, Ok(())),
                changed = changes.changed() => {
                    if changed.is_err() {
                        // Store dropped, nothing more will ever arrive
                        return (writer, pushed, Ok(()));
                    }
                }
            }
            continue;
        }

        let mut pending = batch.into_iter();
        while let Some((category, record)) = pending.next() {
            let result = write_message(&mut writer, &PushMessage::from(&record), write_timeout).await;

            if let Err(e) = result {
                // Undelivered records go back unless something newer arrived
                store.restore(record);
                for (_, rest) in pending {
                    store.restore(rest);
                }
                return (writer, pushed, Err(e));
            }

            pushed += 1;
            debug!(client_id = %id, category = %category, "Pushed notification");
        }
    }
}

async fn write_message<W>(
    writer: &mut W,
    msg: &PushMessage,
    write_timeout: Duration,
) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let line = encode_line(msg)?;

    match timeout(write_timeout, async {
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SessionError::Write(e.to_string())),
        Err(_) => Err(SessionError::WriteTimeout),
    }
}

/// Client → device. Forwards every chunk read, unmodified and in order.
async fn forward_leg<S>(
    id: SessionId,
    mut reader: ReadHalf<S>,
    device: Arc<dyn DeviceLink>,
    token: CancellationToken,
    buffer_size: usize,
) -> (ReadHalf<S>, u64, Result<(), SessionError>)
where
    S: AsyncRead,
{
    let _sibling = token.clone().drop_guard();
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut forwarded = 0;

    loop {
        let read = tokio::select! {
            _ = token.cancelled() => return (reader, forwarded, Ok(())),
            read = reader.read(&mut buf) => read,
        };

        let n = match read {
            Ok(0) => {
                debug!(client_id = %id, "Client sent EOF");
                return (reader, forwarded, Ok(()));
            }
            Ok(n) => n,
            Err(e) => return (reader, forwarded, Err(SessionError::Read(e.to_string()))),
        };

        let Some(chunk) = buf.get(..n) else {
            return (reader, forwarded, Ok(()));
        };

        debug!(client_id = %id, len = n, "Forwarding command bytes");

        if let Err(e) = device.send(chunk).await {
            return (reader, forwarded, Err(e.into()));
        }
        forwarded += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podrelay_core::{NotificationCategory, NotificationRecord};
    use podrelay_device::MockDevice;
    use tokio::io::{AsyncBufReadExt, BufReader};

    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    async fn connected_device() -> MockDevice {
        let device = MockDevice::new();
        let _ = device.connect().await.unwrap();
        device
    }

    fn spawn_session(
        stream: tokio::io::DuplexStream,
        store: Arc<NotificationStore>,
        device: MockDevice,
        run_state: RunState,
    ) -> tokio::task::JoinHandle<SessionStats> {
        let session = ClientSession::new(
            SessionId(1),
            stream,
            store,
            Arc::new(device),
            run_state,
            SessionSettings::default(),
        );
        tokio::spawn(session.run())
    }

    #[test]
    fn test_session_id_display() {
        assert_eq!(SessionId(7).to_string(), "client-7");
    }

    #[tokio::test]
    async fn test_push_leg_delivers_pending_record() {
        let store = Arc::new(NotificationStore::new());
        let device = connected_device().await;
        let (client, server) = tokio::io::duplex(4096);

        store.set(NotificationRecord::anc(2));
        let handle = spawn_session(server, Arc::clone(&store), device, RunState::new());

        let mut lines = BufReader::new(client).lines();
        let line = timeout(TEST_TIMEOUT, lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(line, r#"{"type":"anc","mode":2}"#);
        assert!(store.is_empty());

        drop(lines);
        let stats = timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap();
        assert_eq!(stats.pushed, 1);
    }

    #[tokio::test]
    async fn test_push_leg_wakes_on_later_set() {
        let store = Arc::new(NotificationStore::new());
        let device = connected_device().await;
        let (client, server) = tokio::io::duplex(4096);
        let _handle = spawn_session(server, Arc::clone(&store), device, RunState::new());

        tokio::time::sleep(Duration::from_millis(20)).await;
        store.set(NotificationRecord::conversational_awareness(1));

        let mut lines = BufReader::new(client).lines();
        let line = timeout(TEST_TIMEOUT, lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(line, r#"{"type":"ca","status":1}"#);
    }

    #[tokio::test]
    async fn test_forward_leg_preserves_bytes_and_order() {
        let store = Arc::new(NotificationStore::new());
        let device = connected_device().await;
        let (mut client, server) = tokio::io::duplex(4096);
        let handle = spawn_session(server, store, device.clone(), RunState::new());

        client.write_all(&[0x04, 0x00, 0x04]).await.unwrap();
        client.write_all(&[0x00, 0x09, 0x00]).await.unwrap();
        client.shutdown().await.unwrap();

        let stats = timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap();
        assert_eq!(stats.forwarded, 6);
        assert_eq!(device.sent_bytes(), vec![0x04, 0x00, 0x04, 0x00, 0x09, 0x00]);
    }

    #[tokio::test]
    async fn test_device_failure_ends_session() {
        let store = Arc::new(NotificationStore::new());
        let device = connected_device().await;
        device.fail_sends();
        let (mut client, server) = tokio::io::duplex(4096);
        let handle = spawn_session(server, store, device, RunState::new());

        client.write_all(b"cmd").await.unwrap();

        // Push leg is cancelled by its sibling and the connection closes
        let stats = timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap();
        assert_eq!(stats.forwarded, 0);

        let mut buf = [0u8; 1];
        let n = timeout(TEST_TIMEOUT, client.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_run_state_stop_ends_session() {
        let store = Arc::new(NotificationStore::new());
        let device = connected_device().await;
        let (_client, server) = tokio::io::duplex(4096);
        let run_state = RunState::new();
        let handle = spawn_session(server, store, device, run_state.clone());

        tokio::time::sleep(Duration::from_millis(20)).await;
        run_state.stop();

        timeout(TEST_TIMEOUT, handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failed_write_restores_record() {
        let store = Arc::new(NotificationStore::new());
        let (client, server) = tokio::io::duplex(4096);
        drop(client);

        store.set(NotificationRecord::anc(1));
        let (_reader, writer) = tokio::io::split(server);
        let (_writer, pushed, result) = push_leg(
            SessionId(9),
            writer,
            Arc::clone(&store),
            CancellationToken::new(),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(pushed, 0);
        assert!(matches!(result, Err(SessionError::Write(_))));
        assert_eq!(
            store.peek(NotificationCategory::Anc),
            Some(NotificationRecord::anc(1))
        );
    }
}
