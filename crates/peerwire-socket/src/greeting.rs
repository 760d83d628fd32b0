use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use peerwire_frame::{FrameError, Multipart, MultipartCodec};
use peerwire_transport::{Result, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use crate::identity::MAX_IDENTITY_LEN;

/// Protocol name carried in the first greeting frame.
pub const PROTOCOL_NAME: &[u8] = b"peerwire";
/// Local protocol version (`<major>.<minor>`).
pub const PROTOCOL_VERSION: &str = "1.0";

const MAX_VERSION_LEN: usize = 16;

/// Greeting exchanged by both sides of every new connection:
/// `[protocol, version, identity]`.
///
/// An empty identity asks the remote side to assign one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub protocol: Bytes,
    pub version: String,
    pub identity: Bytes,
}

impl Greeting {
    /// Greeting announcing `identity` with the local protocol name and version.
    pub fn new(identity: Bytes) -> Self {
        Self {
            protocol: Bytes::from_static(PROTOCOL_NAME),
            version: PROTOCOL_VERSION.to_string(),
            identity,
        }
    }

    pub fn to_multipart(&self) -> Multipart {
        Multipart::from(vec![
            self.protocol.clone(),
            Bytes::from(self.version.clone()),
            self.identity.clone(),
        ])
    }

    /// Parse and validate a received greeting.
    pub fn from_multipart(msg: Multipart) -> Result<Self> {
        if msg.len() != 3 {
            return Err(TransportError::Handshake(format!(
                "expected 3 greeting frames, got {}",
                msg.len()
            )));
        }
        let mut parts = msg.into_parts().into_iter();
        let (Some(protocol), Some(version), Some(identity)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(TransportError::Handshake("truncated greeting".to_string()));
        };

        if protocol.as_ref() != PROTOCOL_NAME {
            return Err(TransportError::Handshake(format!(
                "unknown protocol '{}' (expected '{}')",
                String::from_utf8_lossy(&protocol),
                String::from_utf8_lossy(PROTOCOL_NAME)
            )));
        }

        if version.is_empty() || version.len() > MAX_VERSION_LEN {
            return Err(TransportError::Handshake(format!(
                "invalid protocol version length: {}",
                version.len()
            )));
        }
        let version = String::from_utf8(version.to_vec()).map_err(|_| {
            TransportError::Handshake("protocol version is not valid UTF-8".to_string())
        })?;
        if !is_version_compatible(&version, PROTOCOL_VERSION)? {
            return Err(TransportError::Handshake(format!(
                "incompatible version '{version}' (local '{PROTOCOL_VERSION}')"
            )));
        }

        if identity.len() > MAX_IDENTITY_LEN {
            return Err(TransportError::Handshake(format!(
                "invalid identity length: {} (max {MAX_IDENTITY_LEN})",
                identity.len()
            )));
        }

        Ok(Self {
            protocol,
            version,
            identity,
        })
    }
}

/// Send our greeting and read the peer's, bounded by `timeout`.
pub async fn exchange_greeting<S>(
    framed: &mut Framed<S, MultipartCodec>,
    local: &Greeting,
    timeout: Duration,
) -> Result<Greeting>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, send_and_receive(framed, local))
        .await
        .map_err(|_| TransportError::Handshake(format!("timed out after {timeout:?}")))?
}

async fn send_and_receive<S>(
    framed: &mut Framed<S, MultipartCodec>,
    local: &Greeting,
) -> Result<Greeting>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    framed
        .send(local.to_multipart())
        .await
        .map_err(frame_to_transport_error)?;

    match framed.next().await {
        Some(Ok(msg)) => Greeting::from_multipart(msg),
        Some(Err(err)) => Err(frame_to_transport_error(err)),
        None => Err(TransportError::Handshake(
            "connection closed during greeting".to_string(),
        )),
    }
}

fn frame_to_transport_error(err: FrameError) -> TransportError {
    match err {
        FrameError::Io(io) => TransportError::Io(io),
        other => TransportError::Handshake(other.to_string()),
    }
}

fn is_version_compatible(remote_version: &str, local_version: &str) -> Result<bool> {
    let (remote_major, _) = parse_version(remote_version)?;
    let (local_major, _) = parse_version(local_version)?;

    Ok(remote_major == local_major)
}

fn parse_version(version: &str) -> Result<(u16, u16)> {
    let invalid = |reason: &str| {
        TransportError::Handshake(format!("invalid version '{version}': {reason}"))
    };

    let mut parts = version.split('.');
    let major = parts.next().ok_or_else(|| invalid("missing major"))?;
    let minor = parts.next().ok_or_else(|| invalid("missing minor"))?;
    if parts.next().is_some() {
        return Err(invalid("expected '<major>.<minor>'"));
    }

    let major = major
        .parse::<u16>()
        .map_err(|_| invalid("non-numeric major"))?;
    let minor = minor
        .parse::<u16>()
        .map_err(|_| invalid("non-numeric minor"))?;

    Ok((major, minor))
}
