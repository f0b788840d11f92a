//! In-memory device link for testing.
//!
//! Records every `send` and lets tests inject notifications as if the
//! accessory had emitted them.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use podrelay_core::NotificationRecord;

use crate::bridge::EVENT_BUFFER;
use crate::{DeviceError, DeviceEvents, DeviceLink};

/// Mock device link. Clones share state, so a test can keep one handle
/// while the daemon owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    inner: Arc<Mutex<MockDeviceInner>>,
}

#[derive(Debug, Default)]
struct MockDeviceInner {
    event_tx: Option<mpsc::Sender<NotificationRecord>>,
    sent: Vec<Vec<u8>>,
    connect_count: usize,
    fail_connect: bool,
    fail_sends: bool,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockDeviceInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every subsequent `connect()` fail as unreachable.
    pub fn fail_connect(&self) {
        self.inner().fail_connect = true;
    }

    /// Makes every subsequent `send()` fail with an I/O error.
    pub fn fail_sends(&self) {
        self.inner().fail_sends = true;
    }

    /// Emits a notification on the event stream.
    ///
    /// Returns false if the device is not connected or the receiver is gone.
    pub async fn emit(&self, record: NotificationRecord) -> bool {
        let sender = self.inner().event_tx.clone();
        match sender {
            Some(tx) => tx.send(record).await.is_ok(),
            None => false,
        }
    }

    /// Closes the event stream, as if the physical link dropped.
    pub fn disconnect(&self) {
        self.inner().event_tx = None;
    }

    /// Every chunk passed to `send`, in call order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner().sent.clone()
    }

    /// All sent chunks concatenated.
    pub fn sent_bytes(&self) -> Vec<u8> {
        self.inner().sent.concat()
    }

    pub fn connect_count(&self) -> usize {
        self.inner().connect_count
    }
}

#[async_trait]
impl DeviceLink for MockDevice {
    async fn connect(&self) -> Result<DeviceEvents, DeviceError> {
        let mut inner = self.inner();
        if inner.fail_connect {
            return Err(DeviceError::Unreachable {
                path: PathBuf::from("mock"),
                reason: "mock connect failure".to_string(),
            });
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        inner.event_tx = Some(event_tx);
        inner.connect_count += 1;
        Ok(event_rx)
    }

    async fn send(&self, bytes: &[u8]) -> Result<(), DeviceError> {
        let mut inner = self.inner();
        if inner.event_tx.is_none() && inner.connect_count == 0 {
            return Err(DeviceError::NotConnected);
        }
        if inner.fail_sends {
            return Err(DeviceError::Io("mock send failure".to_string()));
        }
        inner.sent.push(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_requires_connect() {
        let device = MockDevice::new();
        assert!(matches!(
            device.send(b"x").await,
            Err(DeviceError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_records_sends_in_order() {
        let device = MockDevice::new();
        let _events = device.connect().await.unwrap();

        device.send(b"ab").await.unwrap();
        device.send(b"cd").await.unwrap();

        assert_eq!(device.sent(), vec![b"ab".to_vec(), b"cd".to_vec()]);
        assert_eq!(device.sent_bytes(), b"abcd".to_vec());
    }

    #[tokio::test]
    async fn test_emit_reaches_event_stream() {
        let device = MockDevice::new();
        let mut events = device.connect().await.unwrap();

        assert!(device.emit(NotificationRecord::anc(2)).await);
        assert_eq!(events.recv().await, Some(NotificationRecord::anc(2)));
    }

    #[tokio::test]
    async fn test_emit_before_connect() {
        let device = MockDevice::new();
        assert!(!device.emit(NotificationRecord::anc(1)).await);
    }

    #[tokio::test]
    async fn test_fail_connect() {
        let device = MockDevice::new();
        device.fail_connect();
        assert!(matches!(
            device.connect().await,
            Err(DeviceError::Unreachable { .. })
        ));
        assert_eq!(device.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnect_closes_stream() {
        let device = MockDevice::new();
        let mut events = device.connect().await.unwrap();
        device.disconnect();
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_fail_sends() {
        let device = MockDevice::new();
        let _events = device.connect().await.unwrap();
        device.fail_sends();
        assert!(matches!(device.send(b"x").await, Err(DeviceError::Io(_))));
        assert!(device.sent().is_empty());
    }
}
