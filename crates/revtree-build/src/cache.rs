//! Bounded cache of immutable trees, keyed by compact handles.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::trace;

use revtree_model::{ObjectId, RevTree};
use revtree_store::ObjectStore;

use crate::error::BuildResult;

/// Default number of trees kept in memory at once.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// A read-through tree cache that maps each distinct [`ObjectId`] to a
/// compact `u32` handle.
///
/// Lazy node descriptors reference their source tree by handle instead of by
/// full id, so millions of staged descriptors stay small. The handle maps
/// are bijective and never shrink; only the tree payloads are subject to LRU
/// eviction, and an evicted tree is reloaded from the backing store on the
/// next [`resolve`](TreeCache::resolve).
pub struct TreeCache {
    store: Arc<dyn ObjectStore>,
    inner: Mutex<Inner>,
}

struct Inner {
    handles: HashMap<ObjectId, u32>,
    ids: HashMap<u32, ObjectId>,
    trees: LruCache<u32, Arc<RevTree>>,
    next_handle: u32,
}

impl TreeCache {
    /// Create a cache over `store` holding at most `capacity` trees.
    pub fn new(store: Arc<dyn ObjectStore>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).expect("cache capacity must be non-zero");
        Self {
            store,
            inner: Mutex::new(Inner {
                handles: HashMap::new(),
                ids: HashMap::new(),
                trees: LruCache::new(capacity),
                next_handle: 0,
            }),
        }
    }

    /// Create a cache with [`DEFAULT_CAPACITY`].
    pub fn with_default_capacity(store: Arc<dyn ObjectStore>) -> Self {
        Self::new(store, DEFAULT_CAPACITY)
    }

    /// Read a tree by id, loading it from the backing store on a miss.
    ///
    /// The canonical empty tree is answered without touching the store.
    pub fn get_tree(&self, id: &ObjectId) -> BuildResult<Arc<RevTree>> {
        if id.is_null() || *id == RevTree::empty_id() {
            return Ok(Arc::new(RevTree::empty()));
        }
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(&handle) = inner.handles.get(id) {
            if let Some(tree) = inner.trees.get(&handle) {
                return Ok(Arc::clone(tree));
            }
        }
        let tree = Arc::new(self.store.get_tree(id)?);
        inner.register(*id, Arc::clone(&tree));
        Ok(tree)
    }

    /// Look up a tree by its handle, reloading it if it was evicted.
    ///
    /// Panics on a handle this cache never issued.
    pub fn resolve(&self, handle: u32) -> BuildResult<Arc<RevTree>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(tree) = inner.trees.get(&handle) {
            return Ok(Arc::clone(tree));
        }
        let id = *inner
            .ids
            .get(&handle)
            .unwrap_or_else(|| panic!("unknown tree handle {handle}"));
        trace!(handle, id = %id.short_hex(), "reloading evicted tree");
        let tree = Arc::new(self.store.get_tree(&id)?);
        inner.trees.put(handle, Arc::clone(&tree));
        Ok(tree)
    }

    /// Register a tree and return its handle, assigning a new handle on
    /// first sight.
    pub fn handle_for(&self, tree: &RevTree) -> u32 {
        let id = tree.id();
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(&handle) = inner.handles.get(&id) {
            if !inner.trees.contains(&handle) {
                inner.trees.put(handle, Arc::new(tree.clone()));
            }
            return handle;
        }
        inner.register(id, Arc::new(tree.clone()))
    }

    /// Warm the cache with a batch of ids in one store round trip.
    ///
    /// Ids absent from the store are skipped, matching
    /// [`ObjectStore::get_all`].
    pub fn preload(&self, ids: &[ObjectId]) -> BuildResult<()> {
        let missing: Vec<ObjectId> = {
            let mut inner = self.inner.lock().expect("lock poisoned");
            ids.iter()
                .copied()
                .filter(|id| {
                    !id.is_null()
                        && match inner.handles.get(id) {
                            Some(handle) => !inner.trees.contains(handle),
                            None => true,
                        }
                })
                .collect()
        };
        if missing.is_empty() {
            return Ok(());
        }
        let trees = self.store.get_all(&missing)?;
        let mut inner = self.inner.lock().expect("lock poisoned");
        for tree in trees {
            inner.register(tree.id(), Arc::new(tree));
        }
        Ok(())
    }

    /// Number of distinct trees ever registered.
    pub fn known_trees(&self) -> usize {
        self.inner.lock().expect("lock poisoned").handles.len()
    }
}

impl Inner {
    fn register(&mut self, id: ObjectId, tree: Arc<RevTree>) -> u32 {
        let handle = match self.handles.get(&id) {
            Some(&handle) => handle,
            None => {
                let handle = self.next_handle;
                self.next_handle += 1;
                self.handles.insert(id, handle);
                self.ids.insert(handle, id);
                handle
            }
        };
        self.trees.put(handle, tree);
        handle
    }
}

impl std::fmt::Debug for TreeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeCache")
            .field("known_trees", &self.known_trees())
            .finish()
    }
}
