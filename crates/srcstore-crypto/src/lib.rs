//! Content hashing for Source Store.
//!
//! Objects are addressed by the RFC 1321 message digest of their bytes, the
//! same digest compilers record in DWARF 5 line tables. The digest is used
//! as an address, not as a security primitive.

pub mod hasher;
pub mod md5;

pub use hasher::ContentHasher;
pub use md5::Md5;
