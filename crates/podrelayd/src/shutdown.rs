//! Process-wide run state and the signal-driven shutdown sequence.
//!
//! ```text
//!   Running ──SIGTERM/SIGINT──▶ Stopping   (once, irreversible)
//! ```
//!
//! On the first signal the coordinator:
//! 1. flips [`RunState`] to stopping, which cancels every token derived
//!    from it, so loops see it on their next check
//! 2. thereby wakes the accept loop, which selects on the same token
//! 3. releases the socket file
//!
//! The process then exits 0 once the server has returned. Further signals
//! are logged and ignored.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::endpoint::Endpoint;

/// `Running` or `Stopping`, shared by every loop in the daemon.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    token: CancellationToken,
    stopping: Arc<AtomicBool>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Transitions to `Stopping`. Returns true only for the call that made
    /// the transition.
    pub fn stop(&self) -> bool {
        let first = !self.stopping.swap(true, Ordering::AcqRel);
        self.token.cancel();
        first
    }

    /// Resolves once the daemon is stopping.
    pub async fn stopped(&self) {
        self.token.cancelled().await;
    }

    /// A token cancelled when the daemon stops, or earlier by its owner.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

/// Reacts to termination signals by stopping the daemon exactly once.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    run_state: RunState,
    endpoint: Arc<Endpoint>,
}

impl ShutdownCoordinator {
    pub fn new(run_state: RunState, endpoint: Arc<Endpoint>) -> Self {
        Self {
            run_state,
            endpoint,
        }
    }

    /// Runs the shutdown sequence.
    ///
    /// Safe to call any number of times; returns true only for the call
    /// that performed the transition.
    pub fn initiate(&self) -> bool {
        if !self.run_state.stop() {
            warn!("Shutdown already in progress");
            return false;
        }

        info!("Stopping daemon");
        self.endpoint.release();
        true
    }

    /// Spawns a task that calls [`Self::initiate`] on every SIGTERM/SIGINT.
    ///
    /// The handlers are installed before this returns, so a signal sent
    /// afterwards is never lost to the default disposition.
    pub fn spawn_signal_listener(&self) -> io::Result<JoinHandle<()>> {
        let mut signals = ShutdownSignals::register()?;
        let coordinator = self.clone();

        Ok(tokio::spawn(async move {
            while let Some(name) = signals.recv().await {
                info!(signal = name, "Received termination signal");
                coordinator.initiate();
            }
            error!("Signal stream closed, no longer listening for shutdown signals");
        }))
    }
}

/// SIGTERM and SIGINT streams.
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    fn register() -> io::Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Waits for the next signal and returns its name.
    async fn recv(&mut self) -> Option<&'static str> {
        tokio::select! {
            received = self.sigterm.recv() => received.map(|()| "SIGTERM"),
            received = self.sigint.recv() => received.map(|()| "SIGINT"),
        }
    }
}
