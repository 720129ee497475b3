use sha2::Digest as _;

use crate::digest::Digest;

/// The digest function the tree is parameterised over.
///
/// Implementations must be deterministic and produce full-width
/// [`Digest`]s; the all-zero digest is reserved for the empty subtree
/// ([`Digest::ZERO`]) and is never the hash of real content for any
/// practical hash function.
pub trait Hasher: Send + Sync {
    /// Hash raw bytes.
    fn digest(&self, data: &[u8]) -> Digest;

    /// Hash the concatenation of two digests (internal node rule).
    fn digest_pair(&self, left: &Digest, right: &Digest) -> Digest {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(left.as_bytes());
        buf[32..].copy_from_slice(right.as_bytes());
        self.digest(&buf)
    }

    /// Hash a key followed by a value (leaf node rule).
    ///
    /// The full key is part of the pre-image so an exclusion proof can
    /// reveal a colliding leaf.
    fn digest_leaf(&self, key: &[u8], value: &[u8]) -> Digest {
        let mut buf = Vec::with_capacity(key.len() + value.len());
        buf.extend_from_slice(key);
        buf.extend_from_slice(value);
        self.digest(&buf)
    }
}

/// BLAKE3 hasher.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn digest(&self, data: &[u8]) -> Digest {
        Digest::from_bytes(*blake3::hash(data).as_bytes())
    }
}

/// SHA-256 hasher.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn digest(&self, data: &[u8]) -> Digest {
        let hash = sha2::Sha256::digest(data);
        Digest::from_bytes(hash.into())
    }
}
