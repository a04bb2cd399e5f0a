use std::collections::HashMap;
use std::sync::RwLock;

use revtree_model::{ObjectId, RevTree};

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All trees are held in memory behind a
/// `RwLock` for safe concurrent access and cloned on read/write.
pub struct InMemoryObjectStore {
    trees: RwLock<HashMap<ObjectId, RevTree>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            trees: RwLock::new(HashMap::new()),
        }
    }

    /// Number of trees currently stored.
    pub fn len(&self) -> usize {
        self.trees.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.trees.read().expect("lock poisoned").is_empty()
    }

    /// Remove all trees from the store.
    pub fn clear(&self) {
        self.trees.write().expect("lock poisoned").clear();
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get_tree(&self, id: &ObjectId) -> StoreResult<RevTree> {
        let map = self.trees.read().expect("lock poisoned");
        map.get(id).cloned().ok_or(StoreError::TreeNotFound(*id))
    }

    fn get_all(&self, ids: &[ObjectId]) -> StoreResult<Vec<RevTree>> {
        let map = self.trees.read().expect("lock poisoned");
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    fn put(&self, tree: &RevTree) -> StoreResult<bool> {
        let id = tree.id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut map = self.trees.write().expect("lock poisoned");
        // Idempotent: content addressing guarantees an existing entry holds
        // the same tree.
        Ok(map.insert(id, tree.clone()).is_none())
    }

    fn put_all(&self, trees: &[RevTree]) -> StoreResult<()> {
        let mut map = self.trees.write().expect("lock poisoned");
        for tree in trees {
            let id = tree.id();
            if id.is_null() {
                return Err(StoreError::NullObjectId);
            }
            map.entry(id).or_insert_with(|| tree.clone());
        }
        Ok(())
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.trees.read().expect("lock poisoned").contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("tree_count", &self.len())
            .finish()
    }
}
