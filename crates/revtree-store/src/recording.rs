use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use revtree_model::{ObjectId, RevTree};

use crate::error::StoreResult;
use crate::traits::ObjectStore;

/// An [`ObjectStore`] wrapper that records which tree ids were fetched.
///
/// Used to verify that rebuilding a tree does not touch subtrees whose
/// membership did not change: a reused subtree must never cause a
/// `get_tree` call against the backing store.
pub struct RecordingObjectStore {
    inner: Arc<dyn ObjectStore>,
    fetched: Mutex<Vec<ObjectId>>,
    fetch_count: AtomicU64,
}

impl RecordingObjectStore {
    /// Wrap a store, recording all subsequent `get_tree`/`get_all` ids.
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            fetched: Mutex::new(Vec::new()),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Total number of tree fetches since the last reset.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// The ids fetched since the last reset, in request order.
    pub fn fetched_ids(&self) -> Vec<ObjectId> {
        self.fetched.lock().expect("lock poisoned").clone()
    }

    /// Returns `true` if the given id was fetched since the last reset.
    pub fn was_fetched(&self, id: &ObjectId) -> bool {
        self.fetched.lock().expect("lock poisoned").contains(id)
    }

    /// Forget all recorded fetches.
    pub fn reset(&self) {
        self.fetched.lock().expect("lock poisoned").clear();
        self.fetch_count.store(0, Ordering::SeqCst);
    }

    fn record(&self, ids: &[ObjectId]) {
        self.fetch_count
            .fetch_add(ids.len() as u64, Ordering::SeqCst);
        self.fetched
            .lock()
            .expect("lock poisoned")
            .extend_from_slice(ids);
    }
}

impl ObjectStore for RecordingObjectStore {
    fn get_tree(&self, id: &ObjectId) -> StoreResult<RevTree> {
        self.record(std::slice::from_ref(id));
        self.inner.get_tree(id)
    }

    fn get_all(&self, ids: &[ObjectId]) -> StoreResult<Vec<RevTree>> {
        self.record(ids);
        self.inner.get_all(ids)
    }

    fn put(&self, tree: &RevTree) -> StoreResult<bool> {
        self.inner.put(tree)
    }

    fn put_all(&self, trees: &[RevTree]) -> StoreResult<()> {
        self.inner.put_all(trees)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        self.inner.exists(id)
    }
}
