//! podrelay Daemon - relays accessory notifications to local clients
//!
//! This crate provides the relay daemon:
//! - `store` - Latest-value slots shared by all client sessions
//! - `server` - Unix socket server and per-client sessions
//! - `shutdown` - Run state and the signal-driven shutdown sequence
//! - `endpoint` - Exclusive ownership of the socket path
//! - `pump` - Moves device notifications into the store
//! - `daemon` - Composition root and exit codes
//! - `config` - Layered configuration
//! - `cli` - The `podrelayd` command line
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      podrelayd daemon                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐  events  ┌──────────────────────────┐  │
//! │  │   DeviceLink    │─────────▶│   NotificationStore      │  │
//! │  │                 │          │  (one slot per category) │  │
//! │  └────────▲────────┘          └────────────┬─────────────┘  │
//! │           │ send(bytes)                    │ take_all       │
//! │           │                                ▼                │
//! │  ┌────────┴────────┐          ┌──────────────────────────┐  │
//! │  │  forward leg    │◀─client─▶│       push leg           │  │
//! │  └─────────────────┘          └──────────────────────────┘  │
//! │            ClientSession (one per connection)               │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod cli;
pub mod config;
pub mod daemon;
pub mod endpoint;
pub mod pump;
pub mod server;
pub mod shutdown;
pub mod store;
