//! Meta records: the commit trailer linking every historical root.
//!
//! On-disk format (36 bytes, all integers little-endian):
//!
//! ```text
//! [4 bytes: magic 0x6d6b6c78]
//! [2 bytes: previous meta file index]
//! [4 bytes: previous meta position]
//! [2 bytes: root file index, high bit = root is a leaf record]
//! [4 bytes: root position]
//! [20 bytes: checksum = first 20 bytes of H(first 16 bytes)]
//! ```
//!
//! Meta records are always written at an offset ≡ 0 (mod 36), which is
//! what lets recovery resynchronise by scanning aligned offsets.

use merklix_types::Hasher;

use crate::error::StoreResult;
use crate::pointer::{pack_index, unpack_index};

/// Size of a meta record in bytes.
pub const META_SIZE: usize = 36;

/// Meta record magic.
pub const META_MAGIC: u32 = 0x6d6b_6c78;

const CHECKSUM_SIZE: usize = 20;
const PREIMAGE_SIZE: usize = 16;

/// A decoded meta record.
///
/// `(prev_index, prev_pos) = (0, 0)` means no previous meta; `(root_index,
/// root_pos) = (0, 0)` means the committed root is NIL. File index 0 is
/// reserved, so neither encoding collides with a real location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaRecord {
    pub prev_index: u16,
    pub prev_pos: u32,
    pub root_index: u16,
    pub root_pos: u32,
    pub root_leaf: bool,
}

impl MetaRecord {
    /// Location of the previous meta record, if any.
    pub fn prev(&self) -> Option<(u16, u32)> {
        if self.prev_index == 0 && self.prev_pos == 0 {
            None
        } else {
            Some((self.prev_index, self.prev_pos))
        }
    }

    /// Location of the root node record, or `None` for a NIL root.
    pub fn root(&self) -> Option<(u16, u32, bool)> {
        if self.root_index == 0 && self.root_pos == 0 {
            None
        } else {
            Some((self.root_index, self.root_pos, self.root_leaf))
        }
    }

    /// Encode with the trailing truncated checksum.
    pub fn encode(&self, hasher: &dyn Hasher) -> StoreResult<[u8; META_SIZE]> {
        let mut data = [0u8; META_SIZE];
        data[0..4].copy_from_slice(&META_MAGIC.to_le_bytes());
        data[4..6].copy_from_slice(&self.prev_index.to_le_bytes());
        data[6..10].copy_from_slice(&self.prev_pos.to_le_bytes());
        let root_raw = pack_index(self.root_index, self.root_leaf)?;
        data[10..12].copy_from_slice(&root_raw.to_le_bytes());
        data[12..16].copy_from_slice(&self.root_pos.to_le_bytes());
        let digest = hasher.digest(&data[..PREIMAGE_SIZE]);
        data[PREIMAGE_SIZE..].copy_from_slice(&digest.as_bytes()[..CHECKSUM_SIZE]);
        Ok(data)
    }

    /// Decode and verify; `None` when the bytes are not a valid meta
    /// record (wrong magic or checksum).
    pub fn decode(hasher: &dyn Hasher, data: &[u8]) -> Option<Self> {
        if data.len() != META_SIZE {
            return None;
        }
        let magic = u32::from_le_bytes(data[0..4].try_into().expect("sliced"));
        if magic != META_MAGIC {
            return None;
        }
        let digest = hasher.digest(&data[..PREIMAGE_SIZE]);
        if data[PREIMAGE_SIZE..] != digest.as_bytes()[..CHECKSUM_SIZE] {
            return None;
        }
        let prev_index = u16::from_le_bytes(data[4..6].try_into().expect("sliced"));
        let prev_pos = u32::from_le_bytes(data[6..10].try_into().expect("sliced"));
        let raw = u16::from_le_bytes(data[10..12].try_into().expect("sliced"));
        let (root_index, root_leaf) = unpack_index(raw);
        let root_pos = u32::from_le_bytes(data[12..16].try_into().expect("sliced"));
        Some(Self {
            prev_index,
            prev_pos,
            root_index,
            root_pos,
            root_leaf,
        })
    }
}
