//! Content-addressed object repository for Source Store.
//!
//! A repository is a directory whose `objects/` child holds one regular file
//! per distinct content digest, named by the digest's 32-character hex form.
//! The bytes of `objects/<hex>` always hash to `<hex>`.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`Repository`] -- the on-disk store, safe to share between processes
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; nothing in this crate deletes one.
//! 2. Write-then-publish: bytes go to a `.tmp-` file first and become visible
//!    at their final name in a single `linkat`/`renameat`.
//! 3. An object already present is never rewritten.
//! 4. Every operation on `objects/` is resolved against a held directory
//!    descriptor, never by re-walking the root path.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod config;
pub mod error;
pub mod memory;
pub mod repository;
pub mod traits;

mod dirfd;

pub use config::{Durability, RepositoryConfig};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use repository::{Repository, OBJECTS_DIR, TEMP_PREFIX};
pub use traits::ObjectStore;
