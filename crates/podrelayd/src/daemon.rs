//! Daemon composition root.
//!
//! Startup order:
//! 1. claim the endpoint (a second daemon fails here, before it can
//!    disturb the device link)
//! 2. connect the device and send the handshake
//! 3. start the event pump
//!
//! Then [`Daemon::run`] serves clients until the run state flips.

use std::sync::Arc;

use tokio::net::UnixListener;
use tracing::info;

use podrelay_device::{DeviceError, DeviceLink};

use crate::config::{ConfigError, RelayConfig};
use crate::endpoint::{Endpoint, EndpointError};
use crate::pump::spawn_event_pump;
use crate::server::RelayServer;
use crate::shutdown::{RunState, ShutdownCoordinator};
use crate::store::NotificationStore;

/// Exit status for a clean, signal-driven shutdown.
pub const EXIT_OK: u8 = 0;

/// Exit status for failures without a more specific code.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status when another daemon owns the endpoint.
pub const EXIT_ENDPOINT_IN_USE: u8 = 2;

/// Exit status when the device link cannot be established.
pub const EXIT_DEVICE_UNAVAILABLE: u8 = 3;

/// Fatal startup errors.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("Failed to connect to device: {0}")]
    Device(#[from] DeviceError),
}

impl DaemonError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Endpoint(EndpointError::InUse { .. }) => EXIT_ENDPOINT_IN_USE,
            Self::Device(_) => EXIT_DEVICE_UNAVAILABLE,
            Self::Config(_) | Self::Endpoint(_) => EXIT_FAILURE,
        }
    }
}

/// A started daemon, ready to serve.
pub struct Daemon {
    endpoint: Arc<Endpoint>,
    listener: UnixListener,
    store: Arc<NotificationStore>,
    run_state: RunState,
    server: RelayServer,
}

impl Daemon {
    /// Claims the endpoint, connects the device and starts the event pump.
    pub async fn start(
        config: &RelayConfig,
        device: Arc<dyn DeviceLink>,
    ) -> Result<Self, DaemonError> {
        config.validate()?;
        let handshake = config.handshake_bytes()?;

        let (endpoint, listener) = Endpoint::bind(&config.socket_path).await?;
        let endpoint = Arc::new(endpoint);

        let events = match device.connect().await {
            Ok(events) => events,
            Err(e) => {
                endpoint.release();
                return Err(e.into());
            }
        };

        if let Some(handshake) = handshake {
            if let Err(e) = device.send(&handshake).await {
                endpoint.release();
                return Err(e.into());
            }
            info!(len = handshake.len(), "Handshake sent");
        }

        let store = Arc::new(NotificationStore::new());
        spawn_event_pump(events, Arc::clone(&store));

        let run_state = RunState::new();
        let server = RelayServer::new(Arc::clone(&store), device, run_state.clone())
            .with_config(config);

        Ok(Self {
            endpoint,
            listener,
            store,
            run_state,
            server,
        })
    }

    /// Returns a coordinator that stops this daemon.
    pub fn coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(self.run_state.clone(), Arc::clone(&self.endpoint))
    }

    pub fn store(&self) -> Arc<NotificationStore> {
        Arc::clone(&self.store)
    }

    pub fn endpoint(&self) -> Arc<Endpoint> {
        Arc::clone(&self.endpoint)
    }

    /// Serves clients until stopped, then releases the endpoint.
    pub async fn run(self) {
        self.server.serve(self.listener).await;
        self.endpoint.release();
        info!("Relay daemon stopped");
    }
}
