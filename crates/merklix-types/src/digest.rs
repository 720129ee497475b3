use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Width of every digest in the system, in bytes.
pub const DIGEST_SIZE: usize = 32;

/// A fixed-width cryptographic digest.
///
/// Every node of the tree is authenticated by a `Digest`; the all-zero
/// digest is the canonical hash of the empty (NIL) subtree and is never
/// produced by hashing actual content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// The all-zero digest: hash of the empty subtree.
    pub const ZERO: Self = Self([0u8; DIGEST_SIZE]);

    /// Wrap a pre-computed hash.
    pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns `true` if this is the all-zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_SIZE]
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != DIGEST_SIZE {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Parse from a byte slice of exactly [`DIGEST_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != DIGEST_SIZE {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_SIZE];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl From<Digest> for [u8; DIGEST_SIZE] {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_all_zeros() {
        let zero = Digest::ZERO;
        assert!(zero.is_zero());
        assert_eq!(zero.as_bytes(), &[0u8; DIGEST_SIZE]);
    }

    #[test]
    fn nonzero_is_not_zero() {
        assert!(!Digest::from_bytes([1u8; DIGEST_SIZE]).is_zero());
    }

    #[test]
    fn hex_roundtrip() {
        let digest = Digest::from_bytes([0xab; DIGEST_SIZE]);
        let hex = digest.to_hex();
        let parsed = Digest::from_hex(&hex).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: DIGEST_SIZE,
                actual: 2
            }
        );
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            Digest::from_hex("zz"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn from_slice_roundtrip() {
        let digest = Digest::from_bytes([7u8; DIGEST_SIZE]);
        let parsed = Digest::from_slice(digest.as_bytes()).unwrap();
        assert_eq!(digest, parsed);
        assert!(Digest::from_slice(&[0u8; 5]).is_err());
    }

    #[test]
    fn display_is_full_hex() {
        let digest = Digest::from_bytes([0x5a; DIGEST_SIZE]);
        let display = format!("{digest}");
        assert_eq!(display.len(), DIGEST_SIZE * 2);
        assert_eq!(display, digest.to_hex());
    }

    #[test]
    fn serde_roundtrip() {
        let digest = Digest::from_bytes([3u8; DIGEST_SIZE]);
        let json = serde_json::to_string(&digest).unwrap();
        let parsed: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn ordering_is_consistent() {
        let a = Digest::from_bytes([0; DIGEST_SIZE]);
        let b = Digest::from_bytes([1; DIGEST_SIZE]);
        assert!(a < b);
    }
}
