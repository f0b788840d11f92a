//! podrelay Core - Shared types for the notification relay
//!
//! This crate provides the domain types shared between the daemon
//! (podrelayd), the device boundary (podrelay-device) and clients.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod battery;
pub mod category;
pub mod error;
pub mod record;

// Re-exports for convenience
pub use battery::{BatteryComponent, BatteryEntry, BatteryStatus};
pub use category::NotificationCategory;
pub use error::{DomainError, DomainResult};
pub use record::{EarDetection, NotificationRecord};
