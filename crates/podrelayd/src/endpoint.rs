//! The daemon's well-known Unix socket.
//!
//! Binding is exclusive: if another daemon answers on the path, startup
//! fails with [`EndpointError::InUse`] and is not retried. A socket file
//! nobody answers on (connection refused) is a leftover from a daemon that
//! died without cleanup; it is removed once and the bind proceeds. Anything
//! else at the path, including a file that is not a socket, is left alone
//! and startup fails.

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

/// Errors that can occur while claiming the endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Socket {path} is already in use by a running daemon")]
    InUse { path: PathBuf },

    #[error("Failed to setup socket at {path}: {error}")]
    Setup { path: PathBuf, error: String },
}

/// Ownership of the socket path.
///
/// Shared between the server and the shutdown coordinator; whichever calls
/// [`Endpoint::release`] first removes the file, later calls do nothing.
#[derive(Debug)]
pub struct Endpoint {
    path: PathBuf,
    released: AtomicBool,
}

impl Endpoint {
    /// Claims `path` and returns the listener bound to it.
    pub async fn bind(path: impl Into<PathBuf>) -> Result<(Self, UnixListener), EndpointError> {
        let path = path.into();

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(EndpointError::Setup {
                    path,
                    error: "path exists and is not a socket".to_string(),
                });
            }

            match UnixStream::connect(&path).await {
                Ok(_) => return Err(EndpointError::InUse { path }),
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    warn!(socket = %path.display(), "Removing stale socket file");
                    std::fs::remove_file(&path).map_err(|e| setup_error(&path, e))?;
                }
                // A live daemon with a full backlog answers WouldBlock
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(EndpointError::InUse { path });
                }
                Err(e) => return Err(setup_error(&path, e)),
            }
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| setup_error(&path, e))?;
            }
        }

        let listener = UnixListener::bind(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::AddrInUse {
                EndpointError::InUse { path: path.clone() }
            } else {
                setup_error(&path, e)
            }
        })?;

        info!(socket = %path.display(), "Endpoint bound");

        Ok((
            Self {
                path,
                released: AtomicBool::new(false),
            },
            listener,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once the socket file has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Removes the socket file. Only the first call does any work.
    ///
    /// Returns true if this call performed the release.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            debug!(socket = %self.path.display(), "Endpoint already released");
            return false;
        }

        match std::fs::remove_file(&self.path) {
            Ok(()) => info!(socket = %self.path.display(), "Endpoint released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                socket = %self.path.display(),
                error = %e,
                "Failed to remove socket file"
            ),
        }
        true
    }
}

fn setup_error(path: &Path, error: io::Error) -> EndpointError {
    EndpointError::Setup {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_creates_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");

        let (endpoint, _listener) = Endpoint::bind(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(endpoint.path(), path.as_path());
        assert!(!endpoint.is_released());
    }

    #[tokio::test]
    async fn test_bind_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("relay.sock");

        let _bound = Endpoint::bind(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_second_bind_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");

        let _first = Endpoint::bind(&path).await.unwrap();
        match Endpoint::bind(&path).await {
            Err(EndpointError::InUse { path: reported }) => assert_eq!(reported, path),
            other => panic!("Expected InUse, got {:?}", other.map(|_| ())),
        }
        // The live daemon's socket is untouched
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");

        {
            let (_endpoint, listener) = Endpoint::bind(&path).await.unwrap();
            drop(listener);
            // Endpoint dropped without release: the file stays behind
        }
        assert!(path.exists());

        let (_endpoint, _listener) = Endpoint::bind(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_regular_file_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "important user data").unwrap();

        match Endpoint::bind(&path).await {
            Err(EndpointError::Setup { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("Expected Setup, got {:?}", other.map(|_| ())),
        }
        assert!(!std::fs::metadata(&path).unwrap().file_type().is_socket());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "important user data");
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.sock");

        let (endpoint, _listener) = Endpoint::bind(&path).await.unwrap();
        assert!(endpoint.release());
        assert!(!path.exists());
        assert!(!endpoint.release());
        assert!(endpoint.is_released());
    }

    #[test]
    fn test_error_display() {
        let err = EndpointError::InUse {
            path: PathBuf::from("/tmp/test.sock"),
        };
        assert!(err.to_string().contains("/tmp/test.sock"));
        assert!(err.to_string().contains("in use"));
    }
}
