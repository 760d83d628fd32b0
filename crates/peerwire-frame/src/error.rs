/// Errors that can occur during multipart encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message header contains an invalid magic number.
    #[error("invalid frame magic (expected 0x5057 \"PW\")")]
    InvalidMagic,

    /// The message body exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The message carries more parts than the wire format allows.
    #[error("too many parts ({count}, max {max})")]
    TooManyParts { count: usize, max: usize },

    /// Part lengths disagree with the declared body length.
    #[error("malformed multipart body: {0}")]
    Malformed(String),

    /// An I/O error occurred while reading or writing messages.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
