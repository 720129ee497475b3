//! Compact proofs and their stateless verifier.
//!
//! Wire format (all integers little-endian):
//!
//! ```text
//! [2: depth d]
//! [ceil(d/8): bitmap, bit i (MSB-first) set = sibling at depth i is the
//!             zero digest and omitted]
//! [32 each: present sibling digests, root-to-leaf order]
//! [1: variant tag  0 = DEADEND, 1 = EXISTS, 2 = COLLISION]
//! EXISTS:    [4: value length] [value]
//! COLLISION: [key] [4: value length] [value]
//! ```
//!
//! Dead-end siblings dominate real trees (every grown chain carries one
//! per level), so compressing them through the bitmap keeps proofs near
//! `d · 32` bytes only for genuinely dense paths.
//!
//! Verification is total: every input maps to a [`Verdict`], never a
//! panic or an error.

use merklix_types::{Digest, Hasher, DIGEST_SIZE};

use crate::node::bit_at;

const TAG_DEADEND: u8 = 0;
const TAG_EXISTS: u8 = 1;
const TAG_COLLISION: u8 = 2;

/// Outcome of verifying a proof against a root hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The key is present with this value.
    Inclusion(Vec<u8>),
    /// The key is provably absent.
    Exclusion,
    /// The reconstructed root does not match.
    MismatchedRoot,
    /// The proof bytes cannot be decoded, or an internal inconsistency.
    Malformed,
    /// The proof claims a depth beyond the key width.
    DepthTooLarge,
    /// A spelled-out sibling equal to the zero digest; the bitmap must
    /// compress it.
    UnexpectedNil,
    /// A collision proof whose carried key equals the requested key.
    SameKey,
}

impl Verdict {
    /// `true` for the two accepting outcomes.
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Inclusion(_) | Verdict::Exclusion)
    }
}

/// Terminal variant of a proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ProofVariant {
    /// Path ends on the requested key's leaf; payload is its value.
    Exists(Vec<u8>),
    /// Path ends on an unrelated leaf sharing the path prefix.
    Collision { key: Vec<u8>, value: Vec<u8> },
    /// Path ends on a NIL subtree.
    DeadEnd,
}

/// A decoded proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Proof {
    /// Sibling digests, root to leaf; `None` is a compressed dead end.
    siblings: Vec<Option<Digest>>,
    variant: ProofVariant,
}

impl Proof {
    pub(crate) fn new(siblings: Vec<Option<Digest>>, variant: ProofVariant) -> Self {
        Self { siblings, variant }
    }

    /// Depth of the proved path.
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let depth = self.siblings.len();
        let mut data = Vec::with_capacity(3 + depth / 8 + depth * DIGEST_SIZE);
        data.extend_from_slice(&(depth as u16).to_le_bytes());

        let mut bitmap = vec![0u8; depth.div_ceil(8)];
        for (i, sibling) in self.siblings.iter().enumerate() {
            if sibling.is_none() {
                bitmap[i / 8] |= 0x80 >> (i % 8);
            }
        }
        data.extend_from_slice(&bitmap);

        for digest in self.siblings.iter().flatten() {
            data.extend_from_slice(digest.as_bytes());
        }

        match &self.variant {
            ProofVariant::DeadEnd => data.push(TAG_DEADEND),
            ProofVariant::Exists(value) => {
                data.push(TAG_EXISTS);
                data.extend_from_slice(&(value.len() as u32).to_le_bytes());
                data.extend_from_slice(value);
            }
            ProofVariant::Collision { key, value } => {
                data.push(TAG_COLLISION);
                data.extend_from_slice(key);
                data.extend_from_slice(&(value.len() as u32).to_le_bytes());
                data.extend_from_slice(value);
            }
        }
        data
    }

    /// Decode proof bytes for a tree of the given key width. The failure
    /// verdicts are returned as `Err` so [`verify`] stays total.
    pub fn decode(data: &[u8], bits: usize) -> Result<Self, Verdict> {
        let mut cursor = Cursor { data, at: 0 };

        let depth = u16::from_le_bytes(cursor.array::<2>()?) as usize;
        if depth > bits {
            return Err(Verdict::DepthTooLarge);
        }

        let bitmap = cursor.bytes(depth.div_ceil(8))?;
        // Unused trailing bitmap bits must stay zero: one state, one
        // encoding.
        for i in depth..bitmap.len() * 8 {
            if bitmap[i / 8] & (0x80 >> (i % 8)) != 0 {
                return Err(Verdict::Malformed);
            }
        }
        let omitted: Vec<bool> = (0..depth)
            .map(|i| bitmap[i / 8] & (0x80 >> (i % 8)) != 0)
            .collect();

        let mut siblings = Vec::with_capacity(depth);
        for dead_end in omitted {
            if dead_end {
                siblings.push(None);
            } else {
                let digest = Digest::from_slice(cursor.bytes(DIGEST_SIZE)?)
                    .map_err(|_| Verdict::Malformed)?;
                siblings.push(Some(digest));
            }
        }

        let tag = cursor.array::<1>()?[0];
        let variant = match tag {
            TAG_DEADEND => ProofVariant::DeadEnd,
            TAG_EXISTS => {
                let len = u32::from_le_bytes(cursor.array::<4>()?) as usize;
                ProofVariant::Exists(cursor.bytes(len)?.to_vec())
            }
            TAG_COLLISION => {
                let key = cursor.bytes(bits / 8)?.to_vec();
                let len = u32::from_le_bytes(cursor.array::<4>()?) as usize;
                ProofVariant::Collision {
                    key,
                    value: cursor.bytes(len)?.to_vec(),
                }
            }
            _ => return Err(Verdict::Malformed),
        };

        if cursor.at != data.len() {
            return Err(Verdict::Malformed);
        }
        Ok(Self { siblings, variant })
    }

    fn check(&self, hasher: &dyn Hasher, root: &Digest, key: &[u8]) -> Verdict {
        let depth = self.siblings.len();

        let mut current = match &self.variant {
            ProofVariant::DeadEnd => Digest::ZERO,
            ProofVariant::Exists(value) => hasher.digest_leaf(key, value),
            ProofVariant::Collision {
                key: carried,
                value,
            } => {
                if carried.len() != key.len() {
                    return Verdict::Malformed;
                }
                if carried == key {
                    return Verdict::SameKey;
                }
                // The colliding leaf sits on the requested key's path, so
                // it must share the whole path prefix.
                for d in 0..depth {
                    if bit_at(carried, d) != bit_at(key, d) {
                        return Verdict::Malformed;
                    }
                }
                hasher.digest_leaf(carried, value)
            }
        };

        for (d, sibling) in self.siblings.iter().enumerate().rev() {
            let sibling = match sibling {
                Some(digest) if digest.is_zero() => return Verdict::UnexpectedNil,
                Some(digest) => *digest,
                None => Digest::ZERO,
            };
            current = if bit_at(key, d) {
                hasher.digest_pair(&sibling, &current)
            } else {
                hasher.digest_pair(&current, &sibling)
            };
        }

        if current != *root {
            return Verdict::MismatchedRoot;
        }
        match &self.variant {
            ProofVariant::Exists(value) => Verdict::Inclusion(value.clone()),
            _ => Verdict::Exclusion,
        }
    }
}

/// Verify proof bytes against a root hash. Stateless and total.
pub fn verify(
    hasher: &dyn Hasher,
    bits: usize,
    root: &Digest,
    key: &[u8],
    proof: &[u8],
) -> Verdict {
    if key.len() != bits / 8 {
        return Verdict::Malformed;
    }
    match Proof::decode(proof, bits) {
        Ok(proof) => proof.check(hasher, root, key),
        Err(verdict) => verdict,
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8], Verdict> {
        let end = self.at.checked_add(len).ok_or(Verdict::Malformed)?;
        if end > self.data.len() {
            return Err(Verdict::Malformed);
        }
        let slice = &self.data[self.at..end];
        self.at = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Verdict> {
        Ok(self.bytes(N)?.try_into().expect("sized slice"))
    }
}
