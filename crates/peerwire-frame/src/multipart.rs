use bytes::Bytes;

/// An ordered list of byte frames sent and received as one atomic unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Multipart {
    parts: Vec<Bytes>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame.
    pub fn push(&mut self, part: impl Into<Bytes>) {
        self.parts.push(part.into());
    }

    /// Insert a frame at the front (used to prepend routing identities).
    pub fn push_front(&mut self, part: impl Into<Bytes>) {
        self.parts.insert(0, part.into());
    }

    /// Remove and return the first frame.
    pub fn pop_front(&mut self) -> Option<Bytes> {
        if self.parts.is_empty() {
            None
        } else {
            Some(self.parts.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bytes> {
        self.parts.get(index)
    }

    pub fn parts(&self) -> &[Bytes] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Bytes> {
        self.parts
    }

    /// Sum of all frame lengths, excluding wire headers.
    pub fn payload_size(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }
}

impl From<Vec<Bytes>> for Multipart {
    fn from(parts: Vec<Bytes>) -> Self {
        Self { parts }
    }
}

impl<const N: usize> From<[&'static [u8]; N]> for Multipart {
    fn from(parts: [&'static [u8]; N]) -> Self {
        Self {
            parts: parts.into_iter().map(Bytes::from_static).collect(),
        }
    }
}

impl FromIterator<Bytes> for Multipart {
    fn from_iter<I: IntoIterator<Item = Bytes>>(iter: I) -> Self {
        Self {
            parts: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Multipart {
    type Item = Bytes;
    type IntoIter = std::vec::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.into_iter()
    }
}
