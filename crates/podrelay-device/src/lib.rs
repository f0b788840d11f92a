//! Device link boundary for the podrelay daemon.
//!
//! The daemon never speaks the accessory's binary protocol. It consumes a
//! [`DeviceLink`]: something that can be connected, accepts raw bytes, and
//! yields already-decoded [`NotificationRecord`]s.
//!
//! Two implementations ship here:
//! - [`BridgeDevice`] talks to a protocol bridge over a Unix socket
//! - [`MockDevice`] records sends and injects events, for tests

mod bridge;
mod error;
mod mock;

pub use bridge::{BridgeDevice, EVENT_BUFFER};
pub use error::DeviceError;
pub use mock::MockDevice;

use async_trait::async_trait;
use tokio::sync::mpsc;

use podrelay_core::NotificationRecord;

/// Stream of decoded notifications produced by a connected device.
pub type DeviceEvents = mpsc::Receiver<NotificationRecord>;

/// The two operations the relay needs from the accessory link.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Establishes the link and returns its notification stream.
    ///
    /// # Errors
    ///
    /// `DeviceError::Unreachable` if the link cannot be established.
    async fn connect(&self) -> Result<DeviceEvents, DeviceError>;

    /// Writes raw protocol bytes to the device.
    ///
    /// # Errors
    ///
    /// `DeviceError::NotConnected` before `connect`, `DeviceError::Io` if the
    /// write fails.
    async fn send(&self, bytes: &[u8]) -> Result<(), DeviceError>;
}
