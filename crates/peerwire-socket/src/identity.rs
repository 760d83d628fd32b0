use bytes::Bytes;
use peerwire_transport::{Result, TransportError};
use uuid::Uuid;

/// Maximum identity length in bytes.
pub const MAX_IDENTITY_LEN: usize = 255;

/// Generate a fresh identity: a random 128-bit value rendered as 32 lowercase
/// hex characters.
///
/// Unique across a process run with overwhelming probability; not a secret.
pub fn generate_identity() -> Bytes {
    Bytes::from(Uuid::new_v4().simple().to_string())
}

/// Reject identities the routing layer cannot carry.
pub fn validate_identity(identity: &[u8]) -> Result<()> {
    if identity.is_empty() || identity.len() > MAX_IDENTITY_LEN {
        return Err(TransportError::Handshake(format!(
            "invalid identity length: {} (expected 1..={MAX_IDENTITY_LEN})",
            identity.len()
        )));
    }
    Ok(())
}

/// Printable rendering of an identity for logs and CLI output.
///
/// UTF-8 identities without control characters print as-is; anything else is
/// rendered as `0x`-prefixed hex.
pub fn display_identity(identity: &[u8]) -> String {
    match std::str::from_utf8(identity) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => {
            let hex: String = identity.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        }
    }
}
