//! Append-only flat-file storage for the merklix authenticated index.
//!
//! A store is a directory of numbered files that only ever grow. Node
//! records, value blobs, and (in standalone mode) meta records are
//! appended in commit batches; a checksummed meta record trailer links
//! every committed root into a backwards chain, and crash recovery scans
//! for the newest valid meta record and truncates whatever follows it.
//!
//! # Components
//!
//! - [`Vfs`] / [`VfsFile`] — the filesystem port; [`DiskFs`] for
//!   production, [`MemFs`] for tests
//! - [`WriteBuffer`] — accumulates one commit batch, assigning final
//!   file positions before any byte reaches disk
//! - [`Store`] — numbered files, bounded open-file cache with random
//!   eviction, meta records, recovery, historical root lookup
//! - [`NodePointer`] / [`ValuePointer`] — on-disk references to node
//!   records and value blobs
//!
//! # Design Rules
//!
//! 1. Committed records are immutable; `(file index, position)` is a
//!    stable identity.
//! 2. Files are never rewritten, only truncated by recovery or removed
//!    by destroy.
//! 3. A commit returns only after every touched file is fsynced.
//! 4. All I/O errors are propagated, never silently ignored; recovery is
//!    the only place where a bad checksum is handled rather than fatal.

pub mod buffer;
pub mod error;
mod file;
pub mod memory;
pub mod meta;
pub mod pointer;
pub mod record;
pub mod store;
pub mod vfs;

pub use buffer::{Chunk, WriteBuffer, MAX_FILE_SIZE};
pub use error::{StoreError, StoreResult};
pub use memory::MemFs;
pub use meta::{MetaRecord, META_MAGIC, META_SIZE};
pub use pointer::{pack_index, unpack_index, NodePointer, ValuePointer, LEAF_TAG, MAX_NODE_FILE};
pub use record::{leaf_size, node_size, InternalRecord, LeafRecord, NodeRecord, INTERNAL_SIZE};
pub use store::{Store, StoreOptions, MAX_FILES, MAX_OPEN_FILES};
pub use vfs::{DiskFs, FileStat, OpenMode, Vfs, VfsFile};
