use srcstore_types::Digest;

use crate::error::StoreResult;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same bytes always produce the
///   same digest.
/// - After `write(data)` returns `Ok(id)`, `exists(&id)` is `true` and
///   `read(&id)` yields exactly `data`.
/// - Writing an object that already exists is a no-op.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its digest.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, id: &Digest) -> StoreResult<Option<Vec<u8>>>;

    /// Write an object and return its digest.
    fn write(&self, data: &[u8]) -> StoreResult<Digest>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &Digest) -> StoreResult<bool>;
}
