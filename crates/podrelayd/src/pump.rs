//! Device event pump: moves decoded notifications into the store.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use podrelay_core::NotificationRecord;
use podrelay_device::DeviceEvents;
use podrelay_protocol::hex_dump;

use crate::store::NotificationStore;

/// Spawns the task that drains the device's notification stream.
///
/// Each record overwrites its category's slot. The task ends when the
/// device closes the stream.
pub fn spawn_event_pump(mut events: DeviceEvents, store: Arc<NotificationStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = events.recv().await {
            log_record(&record);
            store.set(record);
        }
        error!("Device notification stream closed");
    })
}

fn log_record(record: &NotificationRecord) {
    match record {
        NotificationRecord::Battery { entries } => {
            for entry in entries {
                debug!(
                    component = %entry.component,
                    status = %entry.status,
                    level = entry.level,
                    "Battery status"
                );
            }
        }
        NotificationRecord::EarDetection(ear) => {
            debug!(primary = ear.primary, secondary = ear.secondary, "In-ear status");
        }
        NotificationRecord::Anc { mode } => debug!(mode, "ANC status"),
        NotificationRecord::ConversationalAwareness { status } => {
            debug!(status, "Conversational awareness status")
        }
        NotificationRecord::Unknown { label, data } => {
            info!(label = %label, data = %hex_dump(data), "Unhandled notification");
        }
    }
}
