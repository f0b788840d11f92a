//! Daemon configuration.
//!
//! Resolved in layers, later layers winning:
//! built-in defaults → TOML file → environment (`PODRELAY_SOCKET`,
//! `PODRELAY_DEVICE`) → command-line flags.
//!
//! ```toml
//! socket_path = "/run/user/1000/podrelay.sock"
//! device_socket = "/run/user/1000/podrelay-device.sock"
//! read_buffer_size = 1024
//! write_timeout_ms = 10000
//! max_clients = 16
//! shutdown_grace_ms = 500
//! handshake = "00 00 04 00 01 00 02 00 00 00 00 00 00 00 00 00"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub use podrelay_protocol::DEFAULT_SOCKET_PATH;

/// Default device bridge socket path
pub const DEFAULT_DEVICE_SOCKET: &str = "/tmp/podrelay-device.sock";

/// Environment variable overriding the socket path
pub const SOCKET_ENV: &str = "PODRELAY_SOCKET";

/// Environment variable overriding the device bridge path
pub const DEVICE_ENV: &str = "PODRELAY_DEVICE";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Local endpoint clients connect to
    pub socket_path: PathBuf,

    /// Endpoint of the device protocol bridge
    pub device_socket: PathBuf,

    /// Forward-leg read chunk size in bytes
    pub read_buffer_size: usize,

    /// Per-message write timeout on the push leg
    pub write_timeout_ms: u64,

    /// Maximum concurrent client sessions
    pub max_clients: usize,

    /// How long shutdown waits for sessions to finish
    pub shutdown_grace_ms: u64,

    /// Hex bytes sent to the device right after connecting
    pub handshake: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            device_socket: PathBuf::from(DEFAULT_DEVICE_SOCKET),
            read_buffer_size: 1024,
            write_timeout_ms: 10_000,
            max_clients: 16,
            shutdown_grace_ms: 500,
            handshake: None,
        }
    }
}

impl RelayConfig {
    /// Returns the default config file location, if a config dir exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("podrelay").join("config.toml"))
    }

    /// Parses TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Loads a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&text, path)
    }

    /// Loads an explicit file, else the default file if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Applies overrides from a variable lookup (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(socket) = lookup(SOCKET_ENV) {
            self.socket_path = PathBuf::from(socket);
        }
        if let Some(device) = lookup(DEVICE_ENV) {
            self.device_socket = PathBuf::from(device);
        }
    }

    /// Checks value ranges. Called once after all layers are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                field: "read_buffer_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid {
                field: "max_clients",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "write_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.handshake_bytes()?;
        Ok(())
    }

    /// Decodes the handshake, accepting spaces between hex bytes.
    pub fn handshake_bytes(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(text) = &self.handshake else {
            return Ok(None);
        };

        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(&compact)
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                field: "handshake",
                reason: e.to_string(),
            })
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
