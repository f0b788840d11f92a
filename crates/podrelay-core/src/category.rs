//! Notification categories emitted by the device.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of device notification kinds.
///
/// Each category owns exactly one staging slot in the daemon's store.
/// The declaration order is the order in which a drain batch is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// Per-component battery levels
    Battery,

    /// In-ear presence of both buds
    EarDetection,

    /// Active noise cancellation mode
    Anc,

    /// Conversational awareness status
    ConversationalAwareness,

    /// Anything the decoder did not recognise, kept for diagnostics
    Unknown,
}

impl NotificationCategory {
    /// Every category, in drain order.
    pub const ALL: [NotificationCategory; 5] = [
        Self::Battery,
        Self::EarDetection,
        Self::Anc,
        Self::ConversationalAwareness,
        Self::Unknown,
    ];

    /// Number of categories (and therefore store slots).
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this category in [`Self::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Battery => 0,
            Self::EarDetection => 1,
            Self::Anc => 2,
            Self::ConversationalAwareness => 3,
            Self::Unknown => 4,
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Battery => write!(f, "Battery"),
            Self::EarDetection => write!(f, "EarDetection"),
            Self::Anc => write!(f, "ANC"),
            Self::ConversationalAwareness => write!(f, "ConversationalAwareness"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (position, category) in NotificationCategory::ALL.iter().enumerate() {
            assert_eq!(category.index(), position);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(NotificationCategory::Anc.to_string(), "ANC");
    }
}
