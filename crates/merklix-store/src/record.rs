//! Bit-exact node record codec.
//!
//! Two record kinds share one fixed size so a node read is a single
//! positional read of `node_size` bytes. All integers little-endian.
//!
//! ```text
//! internal (2·D + 12 = 76 bytes):
//!   [32: left digest] [2: left index, high bit = left child is a leaf]
//!   [4: left position]
//!   [32: right digest] [2: right index, high bit = right child is a leaf]
//!   [4: right position]
//!
//! leaf (D + key_bytes + 10):
//!   [32: leaf digest] [key_bytes: key]
//!   [2: value index] [4: value position] [4: value size]
//! ```
//!
//! The smaller kind is zero-padded to `node_size = max(internal, leaf)`.
//! A NIL child is encoded as an all-zero pointer; file index 0 is
//! reserved, so no real child collides with it. Whether a record is a
//! leaf or an internal is carried by the pointer leading to it (child
//! pointers here, the root pointer in the meta record), never guessed
//! from the record bytes.

use merklix_types::{Digest, Hasher, DIGEST_SIZE};

use crate::error::{StoreError, StoreResult};
use crate::pointer::{pack_index, unpack_index, NodePointer, ValuePointer};

/// Fixed size of an internal record.
pub const INTERNAL_SIZE: usize = 2 * DIGEST_SIZE + 12;

/// Size of a leaf record before padding.
pub fn leaf_size(key_bytes: usize) -> usize {
    DIGEST_SIZE + key_bytes + 10
}

/// Common record width both kinds are padded to.
pub fn node_size(key_bytes: usize) -> usize {
    INTERNAL_SIZE.max(leaf_size(key_bytes))
}

/// Decoded internal record: two child pointers, `None` for NIL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalRecord {
    pub left: Option<NodePointer>,
    pub right: Option<NodePointer>,
}

impl InternalRecord {
    /// The record's own digest: `H(left ‖ right)` with NIL as the zero
    /// digest.
    pub fn digest(&self, hasher: &dyn Hasher) -> Digest {
        let left = self.left.map(|p| p.digest).unwrap_or(Digest::ZERO);
        let right = self.right.map(|p| p.digest).unwrap_or(Digest::ZERO);
        hasher.digest_pair(&left, &right)
    }

    /// Encode padded to `node_size`.
    pub fn encode(&self, key_bytes: usize) -> StoreResult<Vec<u8>> {
        let mut data = vec![0u8; node_size(key_bytes)];
        encode_child(&mut data[0..38], self.left.as_ref())?;
        encode_child(&mut data[38..76], self.right.as_ref())?;
        Ok(data)
    }

    /// Decode from at least [`INTERNAL_SIZE`] bytes.
    pub fn decode(data: &[u8]) -> StoreResult<Self> {
        if data.len() < INTERNAL_SIZE {
            return Err(StoreError::corrupt("short internal record"));
        }
        Ok(Self {
            left: decode_child(&data[0..38])?,
            right: decode_child(&data[38..76])?,
        })
    }
}

/// Decoded leaf record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafRecord {
    pub digest: Digest,
    pub key: Vec<u8>,
    pub value: ValuePointer,
}

impl LeafRecord {
    /// Encode padded to `node_size`.
    pub fn encode(&self, key_bytes: usize) -> StoreResult<Vec<u8>> {
        if self.key.len() != key_bytes {
            return Err(StoreError::corrupt("leaf key width mismatch"));
        }
        let mut data = vec![0u8; node_size(key_bytes)];
        data[0..DIGEST_SIZE].copy_from_slice(self.digest.as_bytes());
        let key_end = DIGEST_SIZE + key_bytes;
        data[DIGEST_SIZE..key_end].copy_from_slice(&self.key);
        data[key_end..key_end + 2].copy_from_slice(&self.value.index.to_le_bytes());
        data[key_end + 2..key_end + 6].copy_from_slice(&self.value.pos.to_le_bytes());
        data[key_end + 6..key_end + 10].copy_from_slice(&self.value.size.to_le_bytes());
        Ok(data)
    }

    /// Decode from at least `leaf_size(key_bytes)` bytes.
    pub fn decode(data: &[u8], key_bytes: usize) -> StoreResult<Self> {
        if data.len() < leaf_size(key_bytes) {
            return Err(StoreError::corrupt("short leaf record"));
        }
        let digest = Digest::from_slice(&data[0..DIGEST_SIZE])
            .map_err(|_| StoreError::corrupt("short leaf record"))?;
        let key_end = DIGEST_SIZE + key_bytes;
        let key = data[DIGEST_SIZE..key_end].to_vec();
        let index = u16::from_le_bytes([data[key_end], data[key_end + 1]]);
        let pos = u32::from_le_bytes(data[key_end + 2..key_end + 6].try_into().expect("sliced"));
        let size = u32::from_le_bytes(data[key_end + 6..key_end + 10].try_into().expect("sliced"));
        Ok(Self {
            digest,
            key,
            value: ValuePointer { index, pos, size },
        })
    }
}

/// A decoded node record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRecord {
    Internal(InternalRecord),
    Leaf(LeafRecord),
}

impl NodeRecord {
    /// Decode a node record; `leaf` comes from the pointer that led
    /// here, never from the bytes.
    pub fn decode(data: &[u8], key_bytes: usize, leaf: bool) -> StoreResult<Self> {
        if leaf {
            Ok(Self::Leaf(LeafRecord::decode(data, key_bytes)?))
        } else {
            Ok(Self::Internal(InternalRecord::decode(data)?))
        }
    }

    /// The record's own digest.
    pub fn digest(&self, hasher: &dyn Hasher) -> Digest {
        match self {
            Self::Internal(internal) => internal.digest(hasher),
            Self::Leaf(leaf) => leaf.digest,
        }
    }
}

fn encode_child(buf: &mut [u8], child: Option<&NodePointer>) -> StoreResult<()> {
    let Some(ptr) = child else {
        // NIL: all zeros, already in place.
        return Ok(());
    };
    if ptr.index == 0 {
        return Err(StoreError::corrupt("child pointer into reserved file 0"));
    }
    buf[0..DIGEST_SIZE].copy_from_slice(ptr.digest.as_bytes());
    let raw = pack_index(ptr.index, ptr.leaf)?;
    buf[DIGEST_SIZE..DIGEST_SIZE + 2].copy_from_slice(&raw.to_le_bytes());
    buf[DIGEST_SIZE + 2..DIGEST_SIZE + 6].copy_from_slice(&ptr.pos.to_le_bytes());
    Ok(())
}

fn decode_child(buf: &[u8]) -> StoreResult<Option<NodePointer>> {
    let digest = Digest::from_slice(&buf[0..DIGEST_SIZE])
        .map_err(|_| StoreError::corrupt("short child pointer"))?;
    let raw = u16::from_le_bytes([buf[DIGEST_SIZE], buf[DIGEST_SIZE + 1]]);
    let (index, leaf) = unpack_index(raw);
    let pos = u32::from_le_bytes(
        buf[DIGEST_SIZE + 2..DIGEST_SIZE + 6].try_into().expect("sliced"),
    );
    if digest.is_zero() {
        if index != 0 || pos != 0 || leaf {
            return Err(StoreError::corrupt("zero-digest child with live pointer"));
        }
        return Ok(None);
    }
    if index == 0 {
        return Err(StoreError::corrupt("child pointer into reserved file 0"));
    }
    Ok(Some(NodePointer {
        digest,
        index,
        pos,
        leaf,
    }))
}
