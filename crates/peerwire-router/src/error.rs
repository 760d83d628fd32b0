use peerwire_socket::TransportError;

/// Errors surfaced by [`Router`](crate::Router) operations.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// No recipient could be resolved for a send.
    #[error("address error: {0}")]
    Address(String),

    /// The message could not be serialized to JSON.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Failure at the transport boundary, passed through unmodified.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid construction options.
    #[error("invalid router configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
