//! The immutable revision-tree snapshot node.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::geom::{self, Envelope};
use crate::node::{Bucket, Node};
use crate::object::ObjectId;

/// An immutable, content-addressed revision-tree node.
///
/// A tree is either a **leaf** (direct entries, no buckets) or a **bucketed**
/// node (a bucket map fanning out into subtrees). A bucketed node may also
/// carry residual direct feature entries: the "non-promotable" overflow of
/// entries that no single bucket can hold. That is the only legal mix of
/// entries and buckets on one node.
///
/// # Invariants
///
/// - `size` is the recursive count of feature entries reachable from here.
/// - `num_trees` is the recursive count of subtree entries.
/// - Entry vectors are sorted by the clustering order and never contain
///   tombstones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevTree {
    size: u64,
    num_trees: u64,
    tree_entries: Vec<Node>,
    feature_entries: Vec<Node>,
    buckets: BTreeMap<u8, Bucket>,
}

impl RevTree {
    /// Assemble a tree from already-aggregated parts.
    pub fn build(
        size: u64,
        num_trees: u64,
        tree_entries: Vec<Node>,
        feature_entries: Vec<Node>,
        buckets: BTreeMap<u8, Bucket>,
    ) -> Self {
        debug_assert!(
            buckets.is_empty() || tree_entries.is_empty(),
            "a bucketed tree may only carry residual feature entries"
        );
        Self {
            size,
            num_trees,
            tree_entries,
            feature_entries,
            buckets,
        }
    }

    /// The canonical empty tree.
    pub fn empty() -> Self {
        Self {
            size: 0,
            num_trees: 0,
            tree_entries: Vec::new(),
            feature_entries: Vec::new(),
            buckets: BTreeMap::new(),
        }
    }

    /// The id of the canonical empty tree.
    pub fn empty_id() -> ObjectId {
        static EMPTY_ID: OnceLock<ObjectId> = OnceLock::new();
        *EMPTY_ID.get_or_init(|| RevTree::empty().id())
    }

    /// The content id of this tree: the hash of its binary encoding.
    pub fn id(&self) -> ObjectId {
        let encoded = self.to_bytes().expect("tree encoding cannot fail");
        ObjectId::hash_of(&encoded)
    }

    /// Recursive number of features reachable from this node.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Recursive number of subtree entries reachable from this node.
    pub fn num_trees(&self) -> u64 {
        self.num_trees
    }

    /// Direct subtree entries (empty on bucketed nodes).
    pub fn tree_entries(&self) -> &[Node] {
        &self.tree_entries
    }

    /// Direct feature entries. On a bucketed node these are the
    /// non-promotable residuals.
    pub fn feature_entries(&self) -> &[Node] {
        &self.feature_entries
    }

    /// The bucket map, keyed by bucket index.
    pub fn buckets(&self) -> &BTreeMap<u8, Bucket> {
        &self.buckets
    }

    /// Returns `true` if this node fans out into buckets.
    pub fn is_bucketed(&self) -> bool {
        !self.buckets.is_empty()
    }

    /// Returns `true` if the tree holds nothing at all.
    pub fn is_empty(&self) -> bool {
        self.tree_entries.is_empty() && self.feature_entries.is_empty() && self.buckets.is_empty()
    }

    /// Aggregate bounds of all direct entries and buckets.
    pub fn bounds(&self) -> Option<Envelope> {
        let mut acc = None;
        for node in self.tree_entries.iter().chain(&self.feature_entries) {
            acc = geom::union(acc, node.bounds());
        }
        for bucket in self.buckets.values() {
            acc = geom::union(acc, bucket.bounds());
        }
        acc
    }

    /// Serialize to the canonical binary encoding.
    pub fn to_bytes(&self) -> ModelResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ModelError::Encoding(e.to_string()))
    }

    /// Deserialize from the canonical binary encoding.
    pub fn from_bytes(data: &[u8]) -> ModelResult<Self> {
        bincode::deserialize(data).map_err(|e| ModelError::Encoding(e.to_string()))
    }
}
