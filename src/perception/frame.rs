use std::fmt;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a frame's bytes. Two frames are the same iff
/// their hashes are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameHash(String);

impl FrameHash {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One screen capture: encoded image bytes plus their content hash.
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub hash: FrameHash,
}

impl Frame {
    pub fn new(bytes: Vec<u8>) -> Self {
        let hash = FrameHash::of(&bytes);
        Self { bytes, hash }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_fixed_length_lowercase_hex() {
        let h = FrameHash::of(b"frame");
        assert_eq!(h.as_str().len(), 64);
        assert!(h.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            FrameHash::of(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn single_byte_difference_changes_hash() {
        let a = Frame::new(vec![0u8; 4096]);
        let mut other = vec![0u8; 4096];
        other[4095] = 1;
        let b = Frame::new(other);
        assert_ne!(a.hash, b.hash);
        assert_eq!(a.hash, Frame::new(vec![0u8; 4096]).hash);
    }
}
