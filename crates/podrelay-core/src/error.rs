//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur when building domain values from raw device data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Battery level outside 0..=100
    #[error("Invalid battery level: {level} (expected 0-100)")]
    InvalidBatteryLevel { level: u8 },

    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
