//! Length-prefixed multipart message framing.
//!
//! A multipart message is an ordered list of opaque byte frames that is always
//! written and read as one unit. On the wire every message carries:
//! - A 2-byte magic number ("PW") for stream synchronization
//! - A 4-byte little-endian body length
//! - A 2-byte little-endian part count
//!
//! followed by each part as a 4-byte little-endian length and its bytes.
//! Readers never observe a partially received message.

pub mod codec;
pub mod error;
pub mod multipart;

pub use codec::{
    body_len, check_message_size, decode_multipart, encode_multipart, FrameConfig, MultipartCodec,
    DEFAULT_MAX_MESSAGE, HEADER_SIZE, MAX_PARTS, PART_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use multipart::Multipart;
