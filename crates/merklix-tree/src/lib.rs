//! Merklix tree: a persistent authenticated key-value index.
//!
//! A binary radix tree keyed by the bits of a fixed-width hash. Every
//! node carries a cryptographic digest, so any leaf's presence or
//! absence can be proved against a single root hash. Subtrees grow only
//! to disambiguate colliding key paths, padded with NIL dead ends whose
//! zero digests compress out of proofs.
//!
//! Batches of inserts and removes are staged in memory and committed
//! atomically to an append-only store ([`merklix_store`]); every
//! committed root stays addressable through the store's meta chain.
//!
//! ```no_run
//! use merklix_tree::{Config, Tree, Verdict};
//!
//! # fn main() -> Result<(), merklix_tree::TreeError> {
//! let mut tree = Tree::open(Config::new("/var/lib/merklix"))?;
//! let key = [0u8; 32];
//! tree.insert(&key, b"value")?;
//! let root = tree.commit()?;
//!
//! let proof = tree.prove(&root, &key)?;
//! assert_eq!(
//!     tree.verify(&root, &key, &proof),
//!     Verdict::Inclusion(b"value".to_vec())
//! );
//! # Ok(())
//! # }
//! ```

pub mod error;
mod node;
pub mod proof;
pub mod tree;

pub use error::{TreeError, TreeResult};
pub use proof::{verify, Proof, Verdict};
pub use tree::{Config, Tree};
