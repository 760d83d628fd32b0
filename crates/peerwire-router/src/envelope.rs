//! Three-frame message envelope.
//!
//! ```text
//! [ peer identity | JSON payload (UTF-8) | unix seconds (ASCII decimal) ]
//! ```
//!
//! The first frame names the recipient on send and the sender on receive.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use peerwire_frame::Multipart;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Number of frames in an envelope.
pub const ENVELOPE_FRAMES: usize = 3;

/// Why an inbound message was rejected.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("expected {ENVELOPE_FRAMES} frames, got {0}")]
    FrameCount(usize),

    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Build the outbound envelope `[recipient, json(message), timestamp]`.
pub fn seal<T: Serialize + ?Sized>(
    recipient: Bytes,
    message: &T,
    timestamp: i64,
) -> Result<Multipart, serde_json::Error> {
    let payload = serde_json::to_vec(message)?;
    Ok(Multipart::from(vec![
        recipient,
        Bytes::from(payload),
        Bytes::from(timestamp.to_string()),
    ]))
}

/// An inbound envelope whose framing and timestamp have been validated.
///
/// The payload is decoded separately so stale messages are never parsed.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: Bytes,
    pub payload: Bytes,
    pub timestamp: i64,
}

impl Envelope {
    pub fn open(msg: Multipart) -> Result<Self, EnvelopeError> {
        let [sender, payload, timestamp] = <[Bytes; ENVELOPE_FRAMES]>::try_from(msg.into_parts())
            .map_err(|parts| EnvelopeError::FrameCount(parts.len()))?;

        Ok(Self {
            sender,
            payload,
            timestamp: parse_timestamp(&timestamp)?,
        })
    }

    /// Seconds elapsed between sending and `now`. Negative when the sender's
    /// clock runs ahead.
    pub fn age(&self, now: i64) -> i64 {
        now.saturating_sub(self.timestamp)
    }

    /// Timestamps carry whole seconds, so a sub-second `max_age` is compared
    /// as is: with 1.5 s an age of 1 s passes and 2 s is stale.
    pub fn is_stale(&self, now: i64, max_age: Duration) -> bool {
        match u64::try_from(self.age(now)) {
            Ok(age) => Duration::from_secs(age) > max_age,
            Err(_) => false,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

fn parse_timestamp(frame: &[u8]) -> Result<i64, EnvelopeError> {
    std::str::from_utf8(frame)
        .ok()
        .and_then(|text| text.trim().parse::<i64>().ok())
        .ok_or_else(|| EnvelopeError::Timestamp(String::from_utf8_lossy(frame).into_owned()))
}
