use std::collections::HashMap;
use std::sync::RwLock;

use srcstore_crypto::ContentHasher;
use srcstore_types::Digest;

use crate::error::StoreResult;
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. Objects are cloned on read/write.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Digest, Vec<u8>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &Digest) -> StoreResult<Option<Vec<u8>>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn write(&self, data: &[u8]) -> StoreResult<Digest> {
        let id = ContentHasher::hash(data);
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(id).or_insert_with(|| data.to_vec());
        Ok(id)
    }

    fn exists(&self, id: &Digest) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}
