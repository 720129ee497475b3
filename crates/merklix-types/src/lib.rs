//! Foundation types for the merklix authenticated key-value index.
//!
//! This crate provides the digest newtype and the hasher port every other
//! merklix crate is parameterised over.
//!
//! # Key Types
//!
//! - [`Digest`] — Fixed 32-byte cryptographic digest; [`Digest::ZERO`] is
//!   the canonical hash of the empty subtree
//! - [`Hasher`] — The digest function port (`digest(bytes) -> Digest`)
//! - [`Blake3Hasher`], [`Sha256Hasher`] — Shipped implementations
//!
//! All crypto operations wrap established libraries — no custom
//! cryptography.

pub mod digest;
pub mod error;
pub mod hasher;

pub use digest::{Digest, DIGEST_SIZE};
pub use error::TypeError;
pub use hasher::{Blake3Hasher, Hasher, Sha256Hasher};
