#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
#[cfg(unix)]
use std::path::{Path, PathBuf};

use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::stream::Stream;

/// A bound endpoint accepting stream connections.
///
/// Binding is synchronous so that failures (malformed address, port in use)
/// surface to the caller immediately, but it must happen inside a tokio
/// runtime context.
///
/// Unix domain socket paths are created with mode `0600` and removed on
/// `Drop`, unless the path has been replaced by another file in the meantime.
pub struct Listener {
    inner: ListenerInner,
    endpoint: Endpoint,
    #[cfg(unix)]
    created_inode: Option<(PathBuf, u64, u64)>,
}

enum ListenerInner {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Default permission mode for created socket paths.
    #[cfg(unix)]
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(all(unix, not(target_os = "linux")))]
    const MAX_PATH_LEN: usize = 104;

    /// Bind and listen on an endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp { .. } => Self::bind_tcp(endpoint),
            #[cfg(unix)]
            Endpoint::Ipc(path) => Self::bind_unix(path, Self::DEFAULT_SOCKET_MODE),
            #[cfg(not(unix))]
            Endpoint::Ipc(_) => Err(TransportError::Bind {
                endpoint: endpoint.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "ipc endpoints require Unix domain sockets",
                ),
            }),
        }
    }

    fn bind_tcp(endpoint: &Endpoint) -> Result<Self> {
        let bind_err = |source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };
        let addr = endpoint
            .socket_addr_string()
            .ok_or_else(|| bind_err(std::io::Error::other("not a tcp endpoint")))?;

        let std_listener = std::net::TcpListener::bind(&addr).map_err(bind_err)?;
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let local = std_listener.local_addr().map_err(bind_err)?;
        let listener = TcpListener::from_std(std_listener).map_err(bind_err)?;

        let bound = Endpoint::Tcp {
            host: local.ip().to_string(),
            port: local.port(),
        };
        info!(endpoint = %bound, "listening on tcp");

        Ok(Self {
            inner: ListenerInner::Tcp(listener),
            endpoint: bound,
            #[cfg(unix)]
            created_inode: None,
        })
    }

    #[cfg(unix)]
    fn bind_unix(path: &Path, mode: u32) -> Result<Self> {
        let path = path.to_path_buf();
        let endpoint = Endpoint::Ipc(path.clone());
        let bind_err = |source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        };

        let path_bytes = path.as_os_str().len();
        if path_bytes >= Self::MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: Self::MAX_PATH_LEN,
            });
        }

        // Remove stale socket if it exists, but never remove non-socket files.
        if path.exists() {
            let metadata = std::fs::symlink_metadata(&path).map_err(bind_err)?;
            if metadata.file_type().is_socket() {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            } else {
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
            .map_err(bind_err)?;
        let created = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "listening on unix domain socket");

        Ok(Self {
            inner: ListenerInner::Unix(listener),
            created_inode: Some((path, created.dev(), created.ino())),
            endpoint,
        })
    }

    /// Accept an incoming connection.
    ///
    /// Returns the stream and a printable description of the remote side.
    pub async fn accept(&self) -> Result<(Stream, String)> {
        match &self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, addr) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!(remote = %addr, "accepted tcp connection");
                Ok((Stream::from_tcp(stream), addr.to_string()))
            }
            #[cfg(unix)]
            ListenerInner::Unix(listener) => {
                let (stream, _addr) = listener.accept().await.map_err(TransportError::Accept)?;
                debug!("accepted unix connection");
                Ok((Stream::from_unix(stream), self.endpoint.to_string()))
            }
        }
    }

    /// The endpoint this listener is actually bound to.
    ///
    /// For TCP binds on port 0 this carries the port assigned by the OS.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Some((path, expected_dev, expected_ino)) = &self.created_inode {
            if let Ok(metadata) = std::fs::symlink_metadata(path) {
                if metadata.file_type().is_socket()
                    && metadata.dev() == *expected_dev
                    && metadata.ino() == *expected_ino
                {
                    debug!(?path, "cleaning up socket file");
                    let _ = std::fs::remove_file(path);
                } else {
                    debug!(?path, "socket path identity changed; skipping cleanup");
                }
            }
        }
    }
}
