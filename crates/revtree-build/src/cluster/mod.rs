//! Clustering strategies: where each entry lives in the build-time DAG.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use revtree_model::{Envelope, Node, ObjectId, RevTree};

use crate::dag::{Dag, DagNode, DagState};
use crate::error::BuildResult;
use crate::node_id::NodeId;
use crate::storage::DagStorageProvider;
use crate::tree_id::TreeId;

mod canonical;
mod quadtree;

pub use canonical::CanonicalPolicy;
pub use quadtree::{QuadtreePolicy, QUAD_SIZE_LIMIT};

/// The placement rules of one tree shape: how an entry's clustering id is
/// derived and how wide and tall the tree may grow.
pub trait ClusteringPolicy: Send + Sync {
    /// The clustering id of an entry, or `None` if this policy does not
    /// index entries of its kind at all.
    fn compute_id(&self, node: &Node) -> Option<NodeId>;

    /// Fan-out of a DAG node at the given depth index.
    fn max_buckets_for_depth(&self, depth_index: usize) -> u32;

    /// How many direct children a DAG node may hold at the given depth
    /// index before it splits into buckets.
    fn normalized_size_limit(&self, depth_index: usize) -> usize;
}

struct Session {
    root: Dag,
}

/// A mutation session over one revision tree.
///
/// The session starts as a cheap stub over the original tree and mirrors
/// each immutable node's structure lazily, the first time a mutation
/// reaches it. Inserts and removals keep every DAG's recursive
/// `child_count` exact, split leaves that outgrow the policy's size limit,
/// and collapse bucketed nodes that fall back under it.
///
/// All mutations are serialized through one internal mutex: a session is a
/// single-writer object. The storage provider underneath is safe for the
/// concurrent reads the tree builder performs afterwards.
pub struct ClusteringStrategy {
    policy: Box<dyn ClusteringPolicy>,
    storage: Arc<dyn DagStorageProvider>,
    session: Mutex<Session>,
}

impl ClusteringStrategy {
    /// A canonical session over `original`.
    pub fn canonical(original: &RevTree, storage: Arc<dyn DagStorageProvider>) -> Self {
        Self::with_policy(Box::new(CanonicalPolicy), original, storage)
    }

    /// A quadtree session over `original`, splitting `max_bounds` at most
    /// `max_depth` levels deep.
    pub fn quadtree(
        original: &RevTree,
        storage: Arc<dyn DagStorageProvider>,
        max_bounds: Envelope,
        max_depth: usize,
    ) -> Self {
        Self::with_policy(
            Box::new(QuadtreePolicy::new(max_bounds, max_depth)),
            original,
            storage,
        )
    }

    /// A session with a caller-provided policy.
    pub fn with_policy(
        policy: Box<dyn ClusteringPolicy>,
        original: &RevTree,
        storage: Arc<dyn DagStorageProvider>,
    ) -> Self {
        let root = Dag::new(TreeId::root(), original.id());
        Self {
            policy,
            storage,
            session: Mutex::new(Session { root }),
        }
    }

    /// The storage provider backing this session.
    pub fn storage(&self) -> &Arc<dyn DagStorageProvider> {
        &self.storage
    }

    /// The clustering id the policy assigns to `node`.
    pub fn compute_id(&self, node: &Node) -> Option<NodeId> {
        self.policy.compute_id(node)
    }

    /// Leaf size limit at the given depth index.
    pub fn normalized_size_limit(&self, depth_index: usize) -> usize {
        self.policy.normalized_size_limit(depth_index)
    }

    /// Fan-out at the given depth index.
    pub fn max_buckets_for_depth(&self, depth_index: usize) -> u32 {
        self.policy.max_buckets_for_depth(depth_index)
    }

    /// Insert or overwrite an entry; a [tombstone](Node::is_tombstone)
    /// removes it instead.
    ///
    /// Entries the policy does not index are ignored.
    pub fn put(&self, node: &Node) -> BuildResult<()> {
        let Some(node_id) = self.policy.compute_id(node) else {
            return Ok(());
        };
        let remove = node.is_tombstone();
        let mut session = self.session.lock().expect("lock poisoned");
        self.put_recursive(&mut session.root, &node_id, remove, 0)?;
        if !remove {
            // Staged after the placement so it overrides any lazy
            // descriptor the mirror registered for the same name.
            self.storage
                .save_node(node_id, DagNode::Direct(node.clone()))?;
        }
        Ok(())
    }

    /// Remove an entry. The node's name and bounds locate it; its object id
    /// is irrelevant.
    pub fn remove(&self, node: &Node) -> BuildResult<()> {
        self.put(&node.with_object_id(ObjectId::null()))
    }

    /// Remove an entry by name alone.
    ///
    /// Only meaningful for policies whose clustering id derives from the
    /// name; a spatial session needs the node's bounds and must go through
    /// [`remove`](ClusteringStrategy::remove).
    pub fn remove_by_name(&self, name: &str) -> BuildResult<()> {
        self.put(&Node::feature(name, ObjectId::null(), None))
    }

    /// Replace `old` with `new`, relocating the entry if its clustering id
    /// changed (a feature moving across quadrants, or a rename).
    pub fn update(&self, old: &Node, new: &Node) -> BuildResult<()> {
        let old_id = self.policy.compute_id(old);
        if old_id.is_some() && old_id != self.policy.compute_id(new) {
            self.remove(old)?;
        }
        self.put(new)
    }

    /// Materialize a staged entry.
    pub fn node(&self, id: &NodeId) -> BuildResult<Node> {
        self.storage
            .get_node(id)?
            .resolve(self.storage.tree_cache())
    }

    /// Materialize a set of staged entries in storage order.
    pub fn nodes_sorted<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a NodeId>,
    ) -> BuildResult<Vec<Node>> {
        let mut ids: Vec<&NodeId> = ids.into_iter().collect();
        ids.sort();
        ids.into_iter().map(|id| self.node(id)).collect()
    }

    /// A snapshot of the root DAG.
    pub fn root_dag(&self) -> Dag {
        self.session.lock().expect("lock poisoned").root.clone()
    }

    /// Load a batch of DAGs by bucket path.
    pub fn get_dags(&self, ids: &[TreeId]) -> BuildResult<Vec<Dag>> {
        self.storage.get_dags(ids)
    }

    /// Current height of the build-time DAG.
    pub fn depth(&self) -> BuildResult<usize> {
        let session = self.session.lock().expect("lock poisoned");
        self.depth_of(&session.root)
    }

    /// Release the session's staged state.
    pub fn dispose(&self) {
        self.storage.dispose();
    }

    fn depth_of(&self, dag: &Dag) -> BuildResult<usize> {
        let Some(buckets) = dag.buckets() else {
            return Ok(0);
        };
        let mut max = 0;
        for bucket_id in buckets {
            let bucket = self
                .storage
                .get_or_create_dag(bucket_id, &RevTree::empty_id())?;
            max = max.max(1 + self.depth_of(&bucket)?);
        }
        Ok(max)
    }

    /// Place `node_id` in (or remove it from) the subtree rooted at `dag`.
    ///
    /// Returns the entry-count delta this operation caused, so callers can
    /// adjust their own counts on the way back up.
    fn put_recursive(
        &self,
        dag: &mut Dag,
        node_id: &NodeId,
        remove: bool,
        depth: usize,
    ) -> BuildResult<i64> {
        self.merge_root(dag)?;
        let mut changed = false;
        let delta: i64;
        if dag.is_bucketed() {
            match node_id.bucket(depth) {
                Some(bucket) => {
                    let bucket_id = dag.id().child(bucket);
                    let mut bucket_dag = self
                        .storage
                        .get_or_create_dag(&bucket_id, &RevTree::empty_id())?;
                    dag.add_bucket(bucket_id.clone());
                    delta = self.put_recursive(&mut bucket_dag, node_id, remove, depth + 1)?;
                    changed = bucket_dag.state() == DagState::Changed;
                    self.storage.save_dag(&bucket_dag)?;
                    // A bucket drained to zero leaves the fan-out; the same
                    // prune discards the stub a no-op removal just created.
                    if bucket_dag.child_count() == 0 {
                        dag.remove_bucket(&bucket_id);
                    }
                }
                None => {
                    // Cannot descend past this depth: the entry lives in
                    // the node's own overflow set.
                    if remove {
                        delta = -i64::from(dag.remove_non_promotable(node_id));
                    } else {
                        changed = true;
                        delta = i64::from(dag.add_non_promotable(node_id.clone()));
                    }
                }
            }
        } else {
            if remove {
                delta = -i64::from(dag.remove_child(node_id));
            } else {
                changed = true;
                delta = i64::from(dag.add_child(node_id.clone()));
            }
            if dag.num_children() > self.policy.normalized_size_limit(depth) {
                self.promote(dag, depth)?;
            }
        }
        if delta != 0 {
            changed = true;
            let count = dag.child_count() as i64 + delta;
            debug_assert!(count >= 0, "negative child count on {:?}", dag.id());
            dag.set_child_count(count as u64);
            self.shrink_if_underflow(dag, depth)?;
        }
        if changed {
            dag.mark_changed();
        }
        Ok(delta)
    }

    /// Split an overgrown leaf: drain its children and re-place each one a
    /// level deeper, keeping the ones that cannot descend as overflow.
    ///
    /// Membership is unchanged, so the node's `child_count` stays as is.
    fn promote(&self, dag: &mut Dag, depth: usize) -> BuildResult<()> {
        let drained = dag.switch_to_buckets();
        trace!(id = ?dag.id(), children = drained.len(), "splitting leaf into buckets");
        let mut promotions: BTreeMap<u8, Vec<NodeId>> = BTreeMap::new();
        for child in drained {
            match child.bucket(depth) {
                Some(bucket) => promotions.entry(bucket).or_default().push(child),
                None => {
                    dag.add_non_promotable(child);
                }
            }
        }
        for (bucket, children) in promotions {
            let bucket_id = dag.id().child(bucket);
            let mut bucket_dag = self
                .storage
                .get_or_create_dag(&bucket_id, &RevTree::empty_id())?;
            dag.add_bucket(bucket_id);
            for child in &children {
                self.put_recursive(&mut bucket_dag, child, false, depth + 1)?;
            }
            self.storage.save_dag(&bucket_dag)?;
        }
        Ok(())
    }

    /// Collapse a bucketed node back to a leaf once its recursive entry
    /// count falls to the size limit or below.
    ///
    /// Panics if the collected membership disagrees with the tracked
    /// `child_count`; the two are kept in lockstep by every mutation.
    fn shrink_if_underflow(&self, dag: &mut Dag, depth: usize) -> BuildResult<()> {
        if !dag.is_bucketed() {
            return Ok(());
        }
        if dag.child_count() > self.policy.normalized_size_limit(depth) as u64 {
            return Ok(());
        }
        let members = self.children_recursive(dag)?;
        assert_eq!(
            members.len() as u64,
            dag.child_count(),
            "membership of {:?} disagrees with its child count",
            dag.id()
        );
        debug!(id = ?dag.id(), members = members.len(), "collapsing buckets back to a leaf");
        dag.collapse_to_leaf(members);
        Ok(())
    }

    /// Every entry reachable from `dag`, mirroring untouched subtrees on
    /// the way down.
    fn children_recursive(&self, dag: &Dag) -> BuildResult<Vec<NodeId>> {
        if let Some(children) = dag.children() {
            return Ok(children.iter().cloned().collect());
        }
        let mut members: Vec<NodeId> = dag.non_promotable().iter().cloned().collect();
        let buckets = dag.buckets().expect("bucketed DAG holds buckets");
        for bucket_id in buckets {
            let mut bucket = self
                .storage
                .get_or_create_dag(bucket_id, &RevTree::empty_id())?;
            self.merge_root(&mut bucket)?;
            members.extend(self.children_recursive(&bucket)?);
        }
        Ok(members)
    }

    /// Copy the structure of `dag`'s original tree into the DAG, once.
    ///
    /// A leaf original contributes its entries as lazily staged children; a
    /// bucketed original contributes bucket stubs (preloading the bucket
    /// trees in one batch) plus its residual entries as overflow.
    fn merge_root(&self, dag: &mut Dag) -> BuildResult<()> {
        if dag.state() != DagState::Initialized {
            return Ok(());
        }
        let original = self.storage.get_tree(&dag.original_tree_id())?;
        if !original.is_bucketed() {
            dag.set_child_count(
                (original.tree_entries().len() + original.feature_entries().len()) as u64,
            );
            let staged = self.stage_entries(&original)?;
            for id in staged.keys() {
                dag.add_child(id.clone());
            }
            if !staged.is_empty() {
                self.storage.save_nodes(staged)?;
            }
        } else {
            dag.set_child_count(original.size() + original.num_trees());
            dag.switch_to_buckets();
            let residuals = self.stage_entries(&original)?;
            for id in residuals.keys() {
                dag.add_non_promotable(id.clone());
            }
            if !residuals.is_empty() {
                self.storage.save_nodes(residuals)?;
            }
            let bucket_trees: Vec<ObjectId> = original
                .buckets()
                .values()
                .map(revtree_model::Bucket::object_id)
                .collect();
            self.storage.tree_cache().preload(&bucket_trees)?;
            for (&index, bucket) in original.buckets() {
                let child_id = dag.id().child(index);
                self.storage
                    .get_or_create_dag(&child_id, &bucket.object_id())?;
                dag.add_bucket(child_id);
            }
        }
        dag.mark_mirrored();
        Ok(())
    }

    /// Lazy descriptors for every direct entry of `tree` the policy
    /// indexes.
    fn stage_entries(
        &self,
        tree: &RevTree,
    ) -> BuildResult<std::collections::HashMap<NodeId, DagNode>> {
        let mut staged = std::collections::HashMap::new();
        if tree.tree_entries().is_empty() && tree.feature_entries().is_empty() {
            return Ok(staged);
        }
        let handle = self.storage.tree_cache().handle_for(tree);
        for (index, node) in tree.tree_entries().iter().enumerate() {
            if let Some(id) = self.policy.compute_id(node) {
                staged.insert(
                    id,
                    DagNode::Lazy {
                        tree_handle: handle,
                        kind: node.kind(),
                        index,
                    },
                );
            }
        }
        for (index, node) in tree.feature_entries().iter().enumerate() {
            if let Some(id) = self.policy.compute_id(node) {
                staged.insert(
                    id,
                    DagNode::Lazy {
                        tree_handle: handle,
                        kind: node.kind(),
                        index,
                    },
                );
            }
        }
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HeapDagStorageProvider;
    use revtree_model::order;
    use revtree_store::{InMemoryObjectStore, ObjectStore};
    use std::collections::BTreeMap as TreeMap;

    fn feature(name: &str) -> Node {
        Node::feature(name, ObjectId::hash_of(name.as_bytes()), None)
    }

    fn point_feature(name: &str, x: f64, y: f64) -> Node {
        Node::feature(
            name,
            ObjectId::hash_of(name.as_bytes()),
            Some(Envelope::point(x, y)),
        )
    }

    fn world() -> Envelope {
        Envelope::new(-180.0, -90.0, 180.0, 90.0)
    }

    fn canonical_over_empty() -> ClusteringStrategy {
        let store = Arc::new(InMemoryObjectStore::new());
        let storage = Arc::new(HeapDagStorageProvider::new(store));
        ClusteringStrategy::canonical(&RevTree::empty(), storage)
    }

    // -----------------------------------------------------------------------
    // Leaf inserts and removals
    // -----------------------------------------------------------------------

    #[test]
    fn inserts_stay_in_a_leaf_under_the_limit() {
        let strategy = canonical_over_empty();
        for i in 0..10 {
            strategy.put(&feature(&format!("f{i}"))).unwrap();
        }
        let root = strategy.root_dag();
        assert_eq!(root.state(), DagState::Changed);
        assert!(!root.is_bucketed());
        assert_eq!(root.num_children(), 10);
        assert_eq!(root.child_count(), 10);
        assert_eq!(strategy.depth().unwrap(), 0);
    }

    #[test]
    fn reinserting_the_same_name_does_not_grow_the_count() {
        let strategy = canonical_over_empty();
        strategy.put(&feature("f1")).unwrap();
        strategy
            .put(&Node::feature("f1", ObjectId::hash_of(b"v2"), None))
            .unwrap();
        let root = strategy.root_dag();
        assert_eq!(root.child_count(), 1);
        // The staged entry reflects the latest value.
        let node = strategy.node(&NodeId::canonical("f1")).unwrap();
        assert_eq!(node.object_id(), ObjectId::hash_of(b"v2"));
    }

    #[test]
    fn tombstone_put_removes() {
        let strategy = canonical_over_empty();
        strategy.put(&feature("f1")).unwrap();
        strategy.put(&feature("f2")).unwrap();
        strategy
            .put(&feature("f1").with_object_id(ObjectId::null()))
            .unwrap();
        let root = strategy.root_dag();
        assert_eq!(root.child_count(), 1);
        assert!(root
            .children()
            .unwrap()
            .contains(&NodeId::canonical("f2")));
    }

    #[test]
    fn removing_an_absent_entry_is_a_noop() {
        let strategy = canonical_over_empty();
        strategy.put(&feature("f1")).unwrap();
        strategy.remove(&feature("no-such")).unwrap();
        assert_eq!(strategy.root_dag().child_count(), 1);
    }

    #[test]
    fn remove_by_name_matches_canonical_entries() {
        let strategy = canonical_over_empty();
        strategy.put(&feature("f1")).unwrap();
        strategy.remove_by_name("f1").unwrap();
        assert_eq!(strategy.root_dag().child_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Promotion and demotion
    // -----------------------------------------------------------------------

    #[test]
    fn leaf_splits_past_the_size_limit() {
        let strategy = canonical_over_empty();
        let limit = strategy.normalized_size_limit(0);
        for i in 0..=limit {
            strategy.put(&feature(&format!("f{i}"))).unwrap();
        }
        let root = strategy.root_dag();
        assert!(root.is_bucketed());
        assert_eq!(root.child_count(), limit as u64 + 1);
        assert!(root.num_buckets() > 1);
        assert!(root.num_buckets() <= strategy.max_buckets_for_depth(0) as usize);
        assert_eq!(strategy.depth().unwrap(), 1);
    }

    #[test]
    fn buckets_collapse_once_back_under_the_limit() {
        let strategy = canonical_over_empty();
        let limit = strategy.normalized_size_limit(0);
        for i in 0..=limit {
            strategy.put(&feature(&format!("f{i}"))).unwrap();
        }
        assert!(strategy.root_dag().is_bucketed());

        // One removal brings the count back to the limit.
        strategy.remove(&feature("f0")).unwrap();
        let root = strategy.root_dag();
        assert!(!root.is_bucketed());
        assert_eq!(root.child_count(), limit as u64);
        assert_eq!(root.num_children(), limit);
        assert!(!root.children().unwrap().contains(&NodeId::canonical("f0")));
    }

    #[test]
    fn emptied_buckets_leave_the_fanout() {
        let strategy = canonical_over_empty();
        for i in 0..2000 {
            strategy.put(&feature(&format!("f{i}"))).unwrap();
        }
        assert!(strategy.root_dag().is_bucketed());

        // Drain one root bucket completely.
        let victim = NodeId::canonical("f0").bucket(0).unwrap();
        for i in 0..2000 {
            let name = format!("f{i}");
            if NodeId::canonical(&name).bucket(0) == Some(victim) {
                strategy.remove(&feature(&name)).unwrap();
            }
        }

        let root = strategy.root_dag();
        assert!(root.is_bucketed());
        assert!(!root
            .buckets()
            .unwrap()
            .contains(&TreeId::root().child(victim)));
    }

    #[test]
    fn noop_removal_does_not_register_a_bucket() {
        let store = Arc::new(InMemoryObjectStore::new());
        let storage = Arc::new(HeapDagStorageProvider::new(store));
        let strategy = ClusteringStrategy::quadtree(&RevTree::empty(), storage, world(), 8);

        // Fill one quadrant past the limit so the root splits into a
        // single bucket.
        for i in 0..=QUAD_SIZE_LIMIT {
            let x = 1.0 + (i as f64) * 0.01;
            strategy
                .put(&point_feature(&format!("p{i}"), x, 10.0))
                .unwrap();
        }
        let root = strategy.root_dag();
        assert!(root.is_bucketed());
        assert_eq!(root.num_buckets(), 1);

        // Removing an entry that was never inserted routes into an empty
        // quadrant; the root's fan-out must not grow a stub for it.
        strategy.remove(&point_feature("nope", -10.0, -10.0)).unwrap();
        let root = strategy.root_dag();
        assert_eq!(root.num_buckets(), 1);
        assert_eq!(root.child_count(), QUAD_SIZE_LIMIT as u64 + 1);
    }

    // -----------------------------------------------------------------------
    // Mirroring of existing trees
    // -----------------------------------------------------------------------

    #[test]
    fn leaf_original_mirrors_lazily() {
        let store = Arc::new(InMemoryObjectStore::new());
        let features: Vec<Node> = (0..5).map(|i| feature(&format!("f{i}"))).collect();
        let original = RevTree::build(5, 0, vec![], features, TreeMap::new());
        store.put(&original).unwrap();

        let storage = Arc::new(HeapDagStorageProvider::new(store));
        let strategy = ClusteringStrategy::canonical(&original, storage);

        // Untouched: still a stub.
        assert_eq!(strategy.root_dag().state(), DagState::Initialized);

        strategy.remove(&feature("f0")).unwrap();
        let root = strategy.root_dag();
        assert_eq!(root.state(), DagState::Changed);
        assert_eq!(root.child_count(), 4);
        // The surviving mirrored entries resolve to the original's nodes.
        let survivors = strategy
            .nodes_sorted(root.children().unwrap().iter())
            .unwrap();
        assert_eq!(survivors.len(), 4);
        assert!(survivors.iter().all(|n| n.name() != "f0"));
    }

    #[test]
    fn bucketed_original_mirrors_bucket_stubs() {
        let store = Arc::new(InMemoryObjectStore::new());

        // Partition names by their real root bucket so the handmade
        // bucketed tree is structurally valid. The total stays above the
        // root size limit, so the mirrored root is legitimately bucketed
        // and does not collapse on the first mutation.
        let mut by_bucket: TreeMap<u8, Vec<Node>> = TreeMap::new();
        for i in 0..600 {
            let name = format!("f{i}");
            let bucket = order::bucket(order::name_hash(&name), 0).unwrap();
            by_bucket.entry(bucket).or_default().push(feature(&name));
        }
        let mut buckets = TreeMap::new();
        let mut size = 0u64;
        for (index, nodes) in &by_bucket {
            let leaf = RevTree::build(nodes.len() as u64, 0, vec![], nodes.clone(), TreeMap::new());
            size += leaf.size();
            store.put(&leaf).unwrap();
            buckets.insert(*index, revtree_model::Bucket::new(leaf.id(), None));
        }
        let original = RevTree::build(size, 0, vec![], vec![], buckets);
        store.put(&original).unwrap();

        let storage = Arc::new(HeapDagStorageProvider::new(store));
        let strategy = ClusteringStrategy::canonical(&original, storage);

        strategy.put(&feature("extra")).unwrap();
        let root = strategy.root_dag();
        assert!(root.is_bucketed());
        assert_eq!(root.child_count(), size + 1);
        assert!(root.num_buckets() >= by_bucket.len());
    }

    // -----------------------------------------------------------------------
    // Quadtree specifics
    // -----------------------------------------------------------------------

    #[test]
    fn straddling_entries_become_overflow_on_split() {
        let store = Arc::new(InMemoryObjectStore::new());
        let storage = Arc::new(HeapDagStorageProvider::new(store));
        let strategy = ClusteringStrategy::quadtree(&RevTree::empty(), storage, world(), 8);

        let straddler = Node::feature(
            "straddler",
            ObjectId::hash_of(b"straddler"),
            Some(Envelope::new(-1.0, -1.0, 1.0, 1.0)),
        );
        strategy.put(&straddler).unwrap();
        for i in 0..QUAD_SIZE_LIMIT {
            let x = 1.0 + (i as f64) * 0.01;
            strategy
                .put(&point_feature(&format!("p{i}"), x, 10.0))
                .unwrap();
        }

        let root = strategy.root_dag();
        assert!(root.is_bucketed());
        let straddler_id = strategy.compute_id(&straddler).unwrap();
        assert!(root.non_promotable().contains(&straddler_id));
        assert_eq!(root.child_count(), QUAD_SIZE_LIMIT as u64 + 1);

        // Overflow entries can be removed in place.
        strategy.remove(&straddler).unwrap();
        let root = strategy.root_dag();
        assert!(root.non_promotable().is_empty());
    }

    #[test]
    fn update_relocates_a_moved_feature() {
        let store = Arc::new(InMemoryObjectStore::new());
        let storage = Arc::new(HeapDagStorageProvider::new(store));
        let strategy = ClusteringStrategy::quadtree(&RevTree::empty(), storage, world(), 8);

        let old = point_feature("p", 10.0, 10.0);
        let new = point_feature("p", -10.0, -10.0);
        strategy.put(&old).unwrap();
        strategy.update(&old, &new).unwrap();

        let root = strategy.root_dag();
        assert_eq!(root.child_count(), 1);
        let children = root.children().unwrap();
        assert!(children.contains(&strategy.compute_id(&new).unwrap()));
        assert!(!children.contains(&strategy.compute_id(&old).unwrap()));
    }

    #[test]
    fn unindexed_entries_are_ignored() {
        let store = Arc::new(InMemoryObjectStore::new());
        let storage = Arc::new(HeapDagStorageProvider::new(store));
        let strategy = ClusteringStrategy::quadtree(&RevTree::empty(), storage, world(), 8);

        let subtree = Node::tree("sub", ObjectId::hash_of(b"sub"), None);
        strategy.put(&subtree).unwrap();
        assert_eq!(strategy.root_dag().state(), DagState::Initialized);
        assert_eq!(strategy.root_dag().child_count(), 0);
    }
}
