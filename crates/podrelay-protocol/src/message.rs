//! Pushed message types.

use std::collections::BTreeMap;

use podrelay_core::{NotificationCategory, NotificationRecord};
use serde::{Deserialize, Serialize};

/// Battery reading for one component as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentBattery {
    pub status: String,
    pub level: u8,
}

/// Messages sent from the daemon to clients.
///
/// Serialized as a flat JSON object whose `type` field names the category:
///
/// ```json
/// {"type":"battery","LEFT":{"status":"CHARGING","level":80}}
/// {"type":"ear_detection","primary":0,"secondary":1}
/// {"type":"anc","mode":2}
/// {"type":"ca","status":1}
/// {"type":"unknown","data":"04 00 04 00"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    /// One field per component name
    Battery(BTreeMap<String, ComponentBattery>),

    EarDetection { primary: u8, secondary: u8 },

    Anc { mode: u8 },

    #[serde(rename = "ca")]
    ConversationalAwareness { status: u8 },

    /// Space-separated lowercase hex of the raw payload
    Unknown { data: String },
}

impl PushMessage {
    /// Returns the category this message carries.
    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::Battery(_) => NotificationCategory::Battery,
            Self::EarDetection { .. } => NotificationCategory::EarDetection,
            Self::Anc { .. } => NotificationCategory::Anc,
            Self::ConversationalAwareness { .. } => NotificationCategory::ConversationalAwareness,
            Self::Unknown { .. } => NotificationCategory::Unknown,
        }
    }
}

impl From<&NotificationRecord> for PushMessage {
    fn from(record: &NotificationRecord) -> Self {
        match record {
            NotificationRecord::Battery { entries } => Self::Battery(
                entries
                    .iter()
                    .map(|entry| {
                        (
                            entry.component.name().to_string(),
                            ComponentBattery {
                                status: entry.status.name().to_string(),
                                level: entry.level,
                            },
                        )
                    })
                    .collect(),
            ),
            NotificationRecord::EarDetection(ear) => Self::EarDetection {
                primary: ear.primary,
                secondary: ear.secondary,
            },
            NotificationRecord::Anc { mode } => Self::Anc { mode: *mode },
            NotificationRecord::ConversationalAwareness { status } => {
                Self::ConversationalAwareness { status: *status }
            }
            NotificationRecord::Unknown { data, .. } => Self::Unknown {
                data: hex_dump(data),
            },
        }
    }
}

/// Formats bytes as space-separated lowercase hex (`"04 00 ff"`).
pub fn hex_dump(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
