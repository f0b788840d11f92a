//! Category-tagged notification payloads.

use serde::{Deserialize, Serialize};

use crate::battery::BatteryEntry;
use crate::category::NotificationCategory;

/// In-ear presence of the primary and secondary bud.
///
/// Values are the raw indicators reported by the accessory
/// (0 = in ear, 1 = out of ear, 2 = in case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarDetection {
    pub primary: u8,
    pub secondary: u8,
}

impl EarDetection {
    pub fn new(primary: u8, secondary: u8) -> Self {
        Self { primary, secondary }
    }
}

/// A decoded device notification, one variant per [`NotificationCategory`].
///
/// This is the unit stored in a staging slot and the unit the device
/// boundary hands to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum NotificationRecord {
    /// Ordered per-component battery readings
    Battery { entries: Vec<BatteryEntry> },

    /// Presence indicators for both buds
    EarDetection(EarDetection),

    /// Noise control mode
    Anc { mode: u8 },

    /// Conversational awareness status
    ConversationalAwareness { status: u8 },

    /// Unrecognised notification, raw bytes preserved
    Unknown { label: String, data: Vec<u8> },
}

impl NotificationRecord {
    /// Returns the category this record belongs to.
    pub fn category(&self) -> NotificationCategory {
        match self {
            Self::Battery { .. } => NotificationCategory::Battery,
            Self::EarDetection(_) => NotificationCategory::EarDetection,
            Self::Anc { .. } => NotificationCategory::Anc,
            Self::ConversationalAwareness { .. } => NotificationCategory::ConversationalAwareness,
            Self::Unknown { .. } => NotificationCategory::Unknown,
        }
    }

    pub fn battery(entries: Vec<BatteryEntry>) -> Self {
        Self::Battery { entries }
    }

    pub fn ear_detection(primary: u8, secondary: u8) -> Self {
        Self::EarDetection(EarDetection::new(primary, secondary))
    }

    pub fn anc(mode: u8) -> Self {
        Self::Anc { mode }
    }

    pub fn conversational_awareness(status: u8) -> Self {
        Self::ConversationalAwareness { status }
    }

    pub fn unknown(label: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Unknown {
            label: label.into(),
            data: data.into(),
        }
    }
}
