//! Foundation types for Source Store.
//!
//! Every other `srcstore` crate depends on this one for the content address
//! type and the shared error taxonomy.
//!
//! # Key Types
//!
//! - [`Digest`] — 128-bit content address, rendered as 32 lowercase hex chars
//! - [`ErrorKind`] — the kind every crate error classifies itself into
//! - [`SourceReference`] — `(filename, digest)` pair recovered from debug info

pub mod digest;
pub mod error;
pub mod source;

pub use digest::Digest;
pub use error::{io_message, ErrorKind, TypeError};
pub use source::SourceReference;
