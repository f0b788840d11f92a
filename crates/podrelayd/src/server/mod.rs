//! Unix socket relay server.
//!
//! The server:
//! - Accepts client connections on the daemon's endpoint
//! - Spawns a [`ClientSession`] per connection without waiting on it
//! - Logs and survives transient accept errors
//! - Stops accepting as soon as the run state flips to stopping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌───────────────────┐
//! │ ClientSession   │◀───▶│ NotificationStore │
//! │  (per client)   │     └───────────────────┘
//! └───────┬─────────┘
//!         │ send(bytes)
//!         ▼
//! ┌─────────────────┐
//! │   DeviceLink    │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Errors of one session never reach the accept loop

mod session;

pub use session::{ClientSession, SessionError, SessionId, SessionSettings, SessionStats};

use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use podrelay_device::DeviceLink;

use crate::config::RelayConfig;
use crate::shutdown::RunState;
use crate::store::NotificationStore;

/// Default maximum number of concurrent client sessions
pub const DEFAULT_MAX_CLIENTS: usize = 16;

/// Source of client connections.
///
/// Implemented for [`UnixListener`]; tests substitute their own to inject
/// accept failures.
#[async_trait]
pub trait Listener: Send {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    async fn accept(&mut self) -> io::Result<Self::Stream>;
}

#[async_trait]
impl Listener for UnixListener {
    type Stream = UnixStream;

    async fn accept(&mut self) -> io::Result<UnixStream> {
        UnixListener::accept(self).await.map(|(stream, _addr)| stream)
    }
}

/// Relay server: owns the accept loop and spawns sessions.
pub struct RelayServer {
    store: Arc<NotificationStore>,
    device: Arc<dyn DeviceLink>,
    run_state: RunState,
    settings: SessionSettings,
    max_clients: usize,
    shutdown_grace: Duration,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,

    /// Sessions currently running
    active_sessions: Arc<AtomicUsize>,

    sessions: TaskTracker,
}

impl RelayServer {
    /// Creates a server with default session settings.
    pub fn new(
        store: Arc<NotificationStore>,
        device: Arc<dyn DeviceLink>,
        run_state: RunState,
    ) -> Self {
        Self {
            store,
            device,
            run_state,
            settings: SessionSettings::default(),
            max_clients: DEFAULT_MAX_CLIENTS,
            shutdown_grace: Duration::from_millis(500),
            connection_counter: AtomicU64::new(0),
            active_sessions: Arc::new(AtomicUsize::new(0)),
            sessions: TaskTracker::new(),
        }
    }

    /// Applies the tunables from a daemon configuration.
    pub fn with_config(mut self, config: &RelayConfig) -> Self {
        self.settings = SessionSettings {
            read_buffer_size: config.read_buffer_size,
            write_timeout: config.write_timeout(),
        };
        self.max_clients = config.max_clients;
        self.shutdown_grace = config.shutdown_grace();
        self
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Returns the number of sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Acquire)
    }

    /// Accepts connections until the run state flips to stopping.
    ///
    /// Returns after the loop exits and running sessions have finished or
    /// the shutdown grace period has elapsed.
    pub async fn serve<L: Listener>(&self, mut listener: L) {
        info!("Relay server accepting connections");

        loop {
            if self.run_state.is_stopping() {
                break;
            }

            tokio::select! {
                _ = self.run_state.stopped() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok(stream) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, SessionId(conn_num));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        drop(listener);
        self.drain_sessions().await;
    }

    /// Spawns a session for an accepted connection.
    fn handle_connection<S>(&self, stream: S, id: SessionId)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let active = Arc::clone(&self.active_sessions);
        if active.fetch_add(1, Ordering::AcqRel) >= self.max_clients {
            active.fetch_sub(1, Ordering::AcqRel);
            warn!(
                client_id = %id,
                max = self.max_clients,
                "Too many clients, closing connection"
            );
            drop(stream);
            return;
        }

        info!(client_id = %id, "Client connected");

        let session = ClientSession::new(
            id,
            stream,
            Arc::clone(&self.store),
            Arc::clone(&self.device),
            self.run_state.clone(),
            self.settings,
        );

        self.sessions.spawn(async move {
            session.run().await;
            active.fetch_sub(1, Ordering::AcqRel);
        });
    }

    /// Waits, bounded by the grace period, for sessions to tear down.
    async fn drain_sessions(&self) {
        self.sessions.close();

        let remaining = self.sessions.len();
        if remaining == 0 {
            return;
        }

        debug!(sessions = remaining, "Waiting for sessions to finish");
        if timeout(self.shutdown_grace, self.sessions.wait()).await.is_err() {
            warn!(
                sessions = self.sessions.len(),
                "Sessions still running after shutdown grace period"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podrelay_device::MockDevice;

    #[test]
    fn test_with_config_applies_tunables() {
        let config = RelayConfig {
            read_buffer_size: 64,
            write_timeout_ms: 250,
            max_clients: 3,
            shutdown_grace_ms: 50,
            ..Default::default()
        };
        let server = RelayServer::new(
            Arc::new(NotificationStore::new()),
            Arc::new(MockDevice::new()),
            RunState::new(),
        )
        .with_config(&config);

        assert_eq!(server.settings.read_buffer_size, 64);
        assert_eq!(server.settings.write_timeout, Duration::from_millis(250));
        assert_eq!(server.max_clients, 3);
        assert_eq!(server.shutdown_grace, Duration::from_millis(50));
        assert_eq!(server.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_serve_returns_when_already_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let listener = UnixListener::bind(dir.path().join("s.sock")).unwrap();
        let run_state = RunState::new();
        run_state.stop();

        let server = RelayServer::new(
            Arc::new(NotificationStore::new()),
            Arc::new(MockDevice::new()),
            run_state,
        );
        timeout(Duration::from_secs(1), server.serve(listener))
            .await
            .expect("serve returned");
    }
}
