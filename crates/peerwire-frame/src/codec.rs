use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::multipart::Multipart;

/// Message header: magic (2) + body length (4) + part count (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Per-part header: part length (4).
pub const PART_HEADER_SIZE: usize = 4;

/// Magic bytes: "PW" (0x50 0x57).
pub const MAGIC: [u8; 2] = [0x50, 0x57];

/// Default maximum body size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Maximum number of parts in one message.
pub const MAX_PARTS: usize = u16::MAX as usize;

/// Encode a multipart message into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬─────────────┬────────────┬──────────────────────────────┐
/// │ Magic (2B) │ Body length │ Part count │ Body: per part               │
/// │ 0x50 0x57  │ (4B LE)     │ (2B LE)    │ length (4B LE) + bytes       │
/// │ "PW"       │             │            │                              │
/// └────────────┴─────────────┴────────────┴──────────────────────────────┘
/// ```
pub fn encode_multipart(msg: &Multipart, dst: &mut BytesMut) -> Result<()> {
    if msg.len() > MAX_PARTS {
        return Err(FrameError::TooManyParts {
            count: msg.len(),
            max: MAX_PARTS,
        });
    }

    let body_len = body_len(msg);
    if body_len > u32::MAX as usize {
        return Err(FrameError::MessageTooLarge {
            size: body_len,
            max: u32::MAX as usize,
        });
    }

    dst.reserve(HEADER_SIZE + body_len);
    dst.put_slice(&MAGIC);
    dst.put_u32_le(body_len as u32);
    dst.put_u16_le(msg.len() as u16);
    for part in msg.parts() {
        dst.put_u32_le(part.len() as u32);
        dst.put_slice(part);
    }
    Ok(())
}

/// Decode a multipart message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the message bytes from the buffer. Nothing is
/// consumed until the whole message is present.
pub fn decode_multipart(src: &mut BytesMut, max_message: usize) -> Result<Option<Multipart>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let body_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let part_count = u16::from_le_bytes([src[6], src[7]]) as usize;

    if body_len > max_message {
        return Err(FrameError::MessageTooLarge {
            size: body_len,
            max: max_message,
        });
    }
    if part_count * PART_HEADER_SIZE > body_len {
        return Err(FrameError::Malformed(format!(
            "{part_count} parts cannot fit in {body_len} body bytes"
        )));
    }

    let total = HEADER_SIZE + body_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let mut body: Bytes = src.split_to(body_len).freeze();

    let mut parts = Vec::with_capacity(part_count);
    for index in 0..part_count {
        if body.remaining() < PART_HEADER_SIZE {
            return Err(FrameError::Malformed(format!(
                "truncated header for part {index}"
            )));
        }
        let len = body.get_u32_le() as usize;
        if body.remaining() < len {
            return Err(FrameError::Malformed(format!(
                "part {index} declares {len} bytes, {} remain",
                body.remaining()
            )));
        }
        parts.push(body.split_to(len));
    }

    if body.has_remaining() {
        return Err(FrameError::Malformed(format!(
            "{} trailing bytes after last part",
            body.remaining()
        )));
    }

    Ok(Some(Multipart::from(parts)))
}

/// Number of body bytes `msg` occupies on the wire (header excluded).
pub fn body_len(msg: &Multipart) -> usize {
    msg.parts()
        .iter()
        .map(|part| PART_HEADER_SIZE + part.len())
        .sum()
}

/// Check `msg` against the part count and `max_message` body limits without
/// encoding it.
pub fn check_message_size(msg: &Multipart, max_message: usize) -> Result<()> {
    if msg.len() > MAX_PARTS {
        return Err(FrameError::TooManyParts {
            count: msg.len(),
            max: MAX_PARTS,
        });
    }
    let size = body_len(msg);
    if size > max_message {
        return Err(FrameError::MessageTooLarge {
            size,
            max: max_message,
        });
    }
    Ok(())
}

/// Configuration for the multipart codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message body size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// `tokio_util` codec for multipart messages.
///
/// Use with `tokio_util::codec::Framed` (or `FramedRead`/`FramedWrite`) over
/// any `AsyncRead`/`AsyncWrite` stream.
#[derive(Debug, Clone, Default)]
pub struct MultipartCodec {
    config: FrameConfig,
}

impl MultipartCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    /// Current codec configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for MultipartCodec {
    type Item = Multipart;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Multipart>> {
        let decoded = decode_multipart(src, self.config.max_message_size)?;
        if let Some(msg) = &decoded {
            trace!(parts = msg.len(), size = msg.payload_size(), "decoded multipart");
        }
        Ok(decoded)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Multipart>> {
        match self.decode(src)? {
            Some(msg) => Ok(Some(msg)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Multipart> for MultipartCodec {
    type Error = FrameError;

    fn encode(&mut self, msg: Multipart, dst: &mut BytesMut) -> Result<()> {
        check_message_size(&msg, self.config.max_message_size)?;
        encode_multipart(&msg, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    fn envelope() -> Multipart {
        Multipart::from([
            b"server".as_slice(),
            br#"{"q":1}"#.as_slice(),
            b"1700000000".as_slice(),
        ])
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let msg = envelope();

        encode_multipart(&msg, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 3 * PART_HEADER_SIZE + 6 + 7 + 10);

        let decoded = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, msg);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_parts_survive() {
        let mut buf = BytesMut::new();
        let msg = Multipart::from([b"".as_slice(), b"x".as_slice(), b"".as_slice()]);
        encode_multipart(&msg, &mut buf).unwrap();

        let decoded = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert_eq!(decoded.len(), 3);
        assert!(decoded.get(0).unwrap().is_empty());
        assert!(decoded.get(2).unwrap().is_empty());
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x50, 0x57, 0x00][..]);
        assert!(decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_decode_incomplete_body_consumes_nothing() {
        let mut buf = BytesMut::new();
        encode_multipart(&envelope(), &mut buf).unwrap();
        let full = buf.len();
        buf.truncate(full - 3);

        assert!(decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), full - 3);
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_message_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(1024 * 1024 * 32);
        buf.put_u16_le(1);

        let result = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::MessageTooLarge { .. })));
    }

    #[test]
    fn test_decode_part_overruns_body() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(8);
        buf.put_u16_le(1);
        buf.put_u32_le(100);
        buf.put_slice(b"abcd");

        let result = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::Malformed(_))));
    }

    #[test]
    fn test_decode_trailing_bytes_rejected() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(6);
        buf.put_u16_le(1);
        buf.put_u32_le(1);
        buf.put_slice(b"ab");

        let result = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::Malformed(_))));
    }

    #[test]
    fn test_decode_part_count_exceeds_body() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(4);
        buf.put_u16_le(10);

        let result = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE);
        assert!(matches!(result, Err(FrameError::Malformed(_))));
    }

    #[test]
    fn test_multiple_messages_in_buffer() {
        let mut buf = BytesMut::new();
        encode_multipart(&Multipart::from([b"first".as_slice()]), &mut buf).unwrap();
        encode_multipart(&envelope(), &mut buf).unwrap();

        let m1 = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert_eq!(m1.get(0).unwrap().as_ref(), b"first");

        let m2 = decode_multipart(&mut buf, DEFAULT_MAX_MESSAGE)
            .unwrap()
            .unwrap();
        assert_eq!(m2, envelope());
        assert!(buf.is_empty());
    }

    #[test]
    fn codec_rejects_oversized_encode() {
        let mut codec = MultipartCodec::new(FrameConfig {
            max_message_size: 8,
        });
        let mut dst = BytesMut::new();
        let err = codec
            .encode(Multipart::from([b"too-long-payload".as_slice()]), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { .. }));
        assert!(dst.is_empty());
    }

    #[test]
    fn size_check_matches_encoded_body() {
        let msg = Multipart::from([b"abcd".as_slice(), b"".as_slice()]);
        assert_eq!(body_len(&msg), 2 * PART_HEADER_SIZE + 4);

        assert!(check_message_size(&msg, 12).is_ok());
        assert!(matches!(
            check_message_size(&msg, 11),
            Err(FrameError::MessageTooLarge { size: 12, max: 11 })
        ));

        let mut buf = BytesMut::new();
        encode_multipart(&msg, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + body_len(&msg));
    }

    #[test]
    fn codec_eof_with_partial_message_is_connection_closed() {
        let mut codec = MultipartCodec::default();
        let mut buf = BytesMut::new();
        encode_multipart(&envelope(), &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(left, MultipartCodec::default());
        let mut reader = FramedRead::new(right, MultipartCodec::default());

        let send = tokio::spawn(async move {
            for i in 0..16u32 {
                let msg = Multipart::from(vec![
                    Bytes::from(format!("msg-{i}")),
                    Bytes::from(vec![0xAB; 100]),
                ]);
                writer.send(msg).await.unwrap();
            }
        });

        for i in 0..16u32 {
            let msg = reader.next().await.unwrap().unwrap();
            assert_eq!(msg.get(0).unwrap().as_ref(), format!("msg-{i}").as_bytes());
            assert_eq!(msg.get(1).unwrap().len(), 100);
        }

        send.await.unwrap();
        assert!(reader.next().await.is_none());
    }
}
