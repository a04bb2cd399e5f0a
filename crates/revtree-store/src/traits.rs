use revtree_model::{ObjectId, RevTree};

use crate::error::StoreResult;

/// Content-addressed store of immutable revision trees.
///
/// All implementations must satisfy these invariants:
/// - Trees are immutable once written; the same content always produces the
///   same id, so writes are idempotent.
/// - Concurrent reads are always safe.
/// - Reads never mutate the store.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read a tree by its content-addressed id.
    ///
    /// Returns [`StoreError::TreeNotFound`](crate::StoreError::TreeNotFound)
    /// if the tree does not exist.
    fn get_tree(&self, id: &ObjectId) -> StoreResult<RevTree>;

    /// Read several trees in one round trip, skipping ids that are absent.
    ///
    /// Default implementation calls [`get_tree`](ObjectStore::get_tree) per
    /// id. Backends may override for fewer round trips.
    fn get_all(&self, ids: &[ObjectId]) -> StoreResult<Vec<RevTree>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if self.exists(id)? {
                found.push(self.get_tree(id)?);
            }
        }
        Ok(found)
    }

    /// Write a tree. Returns `true` if it was newly stored, `false` if the
    /// id was already present.
    fn put(&self, tree: &RevTree) -> StoreResult<bool>;

    /// Write a batch of trees.
    ///
    /// Default implementation calls [`put`](ObjectStore::put) per tree.
    /// Backends may override for a single sync.
    fn put_all(&self, trees: &[RevTree]) -> StoreResult<()> {
        for tree in trees {
            self.put(tree)?;
        }
        Ok(())
    }

    /// Check whether a tree exists in the store.
    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;
}
