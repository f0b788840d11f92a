//! Battery report types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DomainError, DomainResult};

/// Highest valid battery percentage.
pub const MAX_BATTERY_LEVEL: u8 = 100;

/// A physical part of the accessory that reports its own battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryComponent {
    Left,
    Right,
    Case,
    /// Single-body headsets report one battery
    Headset,
}

impl BatteryComponent {
    /// Returns the component name used as a key on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Case => "CASE",
            Self::Headset => "HEADSET",
        }
    }
}

impl FromStr for BatteryComponent {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEFT" => Ok(Self::Left),
            "RIGHT" => Ok(Self::Right),
            "CASE" => Ok(Self::Case),
            "HEADSET" => Ok(Self::Headset),
            other => Err(DomainError::InvalidFieldValue {
                field: "battery component".to_string(),
                value: other.to_string(),
                expected: "LEFT, RIGHT, CASE or HEADSET".to_string(),
            }),
        }
    }
}

impl fmt::Display for BatteryComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Charging state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryStatus {
    Charging,
    NotCharging,
    /// Component is out of range or not reporting
    Disconnected,
}

impl BatteryStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Charging => "CHARGING",
            Self::NotCharging => "NOT_CHARGING",
            Self::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One component's battery reading.
///
/// Deserialization goes through [`BatteryEntry::new`], so an out-of-range
/// level is rejected however the entry is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBatteryEntry")]
pub struct BatteryEntry {
    pub component: BatteryComponent,
    pub status: BatteryStatus,
    /// Percentage, 0-100
    pub level: u8,
}

impl BatteryEntry {
    /// Creates a battery entry, rejecting levels above 100.
    pub fn new(component: BatteryComponent, status: BatteryStatus, level: u8) -> DomainResult<Self> {
        if level > MAX_BATTERY_LEVEL {
            return Err(DomainError::InvalidBatteryLevel { level });
        }
        Ok(Self {
            component,
            status,
            level,
        })
    }
}

#[derive(Deserialize)]
struct RawBatteryEntry {
    component: BatteryComponent,
    status: BatteryStatus,
    level: u8,
}

impl TryFrom<RawBatteryEntry> for BatteryEntry {
    type Error = DomainError;

    fn try_from(raw: RawBatteryEntry) -> DomainResult<Self> {
        Self::new(raw.component, raw.status, raw.level)
    }
}
