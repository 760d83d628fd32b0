use std::path::PathBuf;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint address could not be parsed or uses an unsupported scheme.
    #[error("invalid endpoint address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Failed to bind to the specified endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The connection greeting was rejected or could not be completed.
    #[error("greeting failed: {0}")]
    Handshake(String),

    /// No connected peer is known under the requested identity.
    #[error("no route to peer '{0}'")]
    HostUnreachable(String),

    /// The message exceeds the configured maximum body size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The message carries more parts than the wire format allows.
    #[error("too many message parts ({count}, max {max})")]
    TooManyParts { count: usize, max: usize },

    /// The peer's outbound queue is at capacity.
    #[error("outbound queue to peer '{0}' is full")]
    QueueFull(String),

    /// The transport has been shut down.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
