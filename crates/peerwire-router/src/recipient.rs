use std::fmt;

use bytes::Bytes;
use peerwire_socket::display_identity;

/// Address of the peer a message is sent to.
///
/// Text is UTF-8 encoded; bytes are used as-is.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Recipient(Bytes);

impl Recipient {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<&str> for Recipient {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for Recipient {
    fn from(value: String) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<&[u8]> for Recipient {
    fn from(value: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for Recipient {
    fn from(value: &[u8; N]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<u8>> for Recipient {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<Bytes> for Recipient {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl From<&Bytes> for Recipient {
    fn from(value: &Bytes) -> Self {
        Self(value.clone())
    }
}

impl fmt::Debug for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Recipient")
            .field(&display_identity(&self.0))
            .finish()
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_identity(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_bytes_address_the_same_peer() {
        assert_eq!(Recipient::from("server"), Recipient::from(b"server"));
        assert_eq!(
            Recipient::from(String::from("server")),
            Recipient::from(Bytes::from_static(b"server"))
        );
    }

    #[test]
    fn non_ascii_text_is_utf8_encoded() {
        assert_eq!(Recipient::from("żółw").as_bytes(), "żółw".as_bytes());
    }

    #[test]
    fn binary_recipients_display_as_hex() {
        assert_eq!(Recipient::from(vec![0u8, 0xff]).to_string(), "0x00ff");
    }
}
