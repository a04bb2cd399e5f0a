//! The mutable build-time counterpart of an immutable revision tree.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use revtree_model::{Node, NodeKind, ObjectId, RevTree};

use crate::cache::TreeCache;
use crate::error::{BuildError, BuildResult};
use crate::node_id::{ClusteringKey, NodeId};
use crate::tree_id::TreeId;

/// Lifecycle state of a [`Dag`].
///
/// A DAG starts `Initialized` (a stub pointing at its original tree),
/// becomes `Mirrored` once the original's structure has been copied in, and
/// becomes `Changed` on the first mutation. Only `Changed` DAGs are rebuilt;
/// everything else resolves to its original tree id unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DagState {
    /// Freshly created; the original tree's shape is not loaded yet.
    Initialized,
    /// Structure mirrors the original tree; no mutations applied.
    Mirrored,
    /// Diverged from the original tree.
    Changed,
}

/// What a DAG currently holds: direct children or bucket pointers.
#[derive(Clone, Debug, PartialEq)]
enum DagContents {
    Leaf(HashSet<NodeId>),
    Buckets(BTreeSet<TreeId>),
}

/// A mutable DAG node, identified by its bucket path from the root.
///
/// # Invariants
///
/// - `child_count` is the recursive number of entries reachable from this
///   node, kept exact by delta propagation on every insert and removal.
/// - A node holds either direct children or buckets, never both; the
///   `non_promotable` overflow set is only populated while bucketed.
/// - State never moves backwards: `Initialized` -> `Mirrored` -> `Changed`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dag {
    id: TreeId,
    original_tree_id: ObjectId,
    child_count: u64,
    state: DagState,
    contents: DagContents,
    non_promotable: HashSet<NodeId>,
}

impl Dag {
    /// Create a stub DAG mirroring nothing yet.
    pub fn new(id: TreeId, original_tree_id: ObjectId) -> Self {
        Self {
            id,
            original_tree_id,
            child_count: 0,
            state: DagState::Initialized,
            contents: DagContents::Leaf(HashSet::new()),
            non_promotable: HashSet::new(),
        }
    }

    /// This DAG's bucket path.
    pub fn id(&self) -> &TreeId {
        &self.id
    }

    /// The immutable tree this DAG was initialized from.
    pub fn original_tree_id(&self) -> ObjectId {
        self.original_tree_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DagState {
        self.state
    }

    /// Recursive number of entries reachable from this node.
    pub fn child_count(&self) -> u64 {
        self.child_count
    }

    /// Overwrite the recursive entry count.
    pub fn set_child_count(&mut self, count: u64) {
        self.child_count = count;
    }

    /// Returns `true` if this DAG fans out into buckets.
    pub fn is_bucketed(&self) -> bool {
        matches!(self.contents, DagContents::Buckets(_))
    }

    /// Direct children, if this DAG is a leaf.
    pub fn children(&self) -> Option<&HashSet<NodeId>> {
        match &self.contents {
            DagContents::Leaf(children) => Some(children),
            DagContents::Buckets(_) => None,
        }
    }

    /// Bucket child ids, if this DAG is bucketed.
    pub fn buckets(&self) -> Option<&BTreeSet<TreeId>> {
        match &self.contents {
            DagContents::Leaf(_) => None,
            DagContents::Buckets(buckets) => Some(buckets),
        }
    }

    /// Entries that cannot be promoted into any bucket at this depth.
    pub fn non_promotable(&self) -> &HashSet<NodeId> {
        &self.non_promotable
    }

    /// Number of direct children on a leaf (zero while bucketed).
    pub fn num_children(&self) -> usize {
        self.children().map_or(0, HashSet::len)
    }

    /// Number of bucket children (zero on a leaf).
    pub fn num_buckets(&self) -> usize {
        self.buckets().map_or(0, BTreeSet::len)
    }

    /// Add a direct child. Returns `true` if it was not present.
    ///
    /// Panics if this DAG is bucketed.
    pub fn add_child(&mut self, child: NodeId) -> bool {
        match &mut self.contents {
            DagContents::Leaf(children) => children.insert(child),
            DagContents::Buckets(_) => {
                panic!("cannot add a direct child to bucketed DAG {:?}", self.id)
            }
        }
    }

    /// Remove a direct child. Returns `true` if it was present.
    pub fn remove_child(&mut self, child: &NodeId) -> bool {
        match &mut self.contents {
            DagContents::Leaf(children) => children.remove(child),
            DagContents::Buckets(_) => false,
        }
    }

    /// Register a bucket child. Returns `true` if it was not present.
    ///
    /// Panics if this DAG is a leaf.
    pub fn add_bucket(&mut self, bucket: TreeId) -> bool {
        match &mut self.contents {
            DagContents::Buckets(buckets) => buckets.insert(bucket),
            DagContents::Leaf(_) => {
                panic!("cannot add a bucket to leaf DAG {:?}", self.id)
            }
        }
    }

    /// Drop a bucket child. Returns `true` if it was present.
    pub fn remove_bucket(&mut self, bucket: &TreeId) -> bool {
        match &mut self.contents {
            DagContents::Buckets(buckets) => buckets.remove(bucket),
            DagContents::Leaf(_) => false,
        }
    }

    /// Stage a non-promotable entry. Returns `true` if it was not present.
    pub fn add_non_promotable(&mut self, child: NodeId) -> bool {
        self.non_promotable.insert(child)
    }

    /// Drop a non-promotable entry. Returns `true` if it was present.
    pub fn remove_non_promotable(&mut self, child: &NodeId) -> bool {
        self.non_promotable.remove(child)
    }

    /// Turn a leaf into an empty bucketed node, returning the drained
    /// children for redistribution.
    pub fn switch_to_buckets(&mut self) -> HashSet<NodeId> {
        let drained = match &mut self.contents {
            DagContents::Leaf(children) => std::mem::take(children),
            DagContents::Buckets(_) => HashSet::new(),
        };
        self.contents = DagContents::Buckets(BTreeSet::new());
        drained
    }

    /// Collapse a bucketed node back to a leaf holding exactly `members`.
    ///
    /// The previous buckets and the non-promotable overflow are discarded;
    /// `members` must already include the overflow entries.
    pub fn collapse_to_leaf(&mut self, members: impl IntoIterator<Item = NodeId>) {
        self.contents = DagContents::Leaf(members.into_iter().collect());
        self.non_promotable.clear();
    }

    /// Mark the original tree's structure as copied in.
    ///
    /// Panics unless the DAG is still `Initialized`.
    pub fn mark_mirrored(&mut self) {
        assert_eq!(
            self.state,
            DagState::Initialized,
            "DAG {:?} mirrored twice",
            self.id
        );
        self.state = DagState::Mirrored;
    }

    /// Mark this DAG as diverged from its original tree.
    ///
    /// Panics if the DAG was never mirrored; mutations may only follow a
    /// mirror.
    pub fn mark_changed(&mut self) {
        assert_ne!(
            self.state,
            DagState::Initialized,
            "DAG {:?} mutated before being mirrored",
            self.id
        );
        self.state = DagState::Changed;
    }

    /// Encode this DAG as a staging-store record: flags byte, state byte,
    /// original id, child count, then the child-or-bucket and
    /// non-promotable id lists. The record's `TreeId` lives in the store
    /// key, not in the record. Private to one build; never a durable
    /// on-disk contract.
    pub(crate) fn encode_record(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.push(u8::from(self.is_bucketed()));
        buf.push(match self.state {
            DagState::Initialized => 0,
            DagState::Mirrored => 1,
            DagState::Changed => 2,
        });
        buf.extend_from_slice(self.original_tree_id.as_bytes());
        buf.extend_from_slice(&self.child_count.to_le_bytes());
        match &self.contents {
            DagContents::Leaf(children) => {
                buf.extend_from_slice(&(children.len() as u32).to_le_bytes());
                for child in children {
                    encode_node_id(child, &mut buf);
                }
            }
            DagContents::Buckets(buckets) => {
                buf.extend_from_slice(&(buckets.len() as u32).to_le_bytes());
                for bucket in buckets {
                    let path = bucket.as_bytes();
                    debug_assert!(path.len() <= u8::MAX as usize);
                    buf.push(path.len() as u8);
                    buf.extend_from_slice(path);
                }
            }
        }
        buf.extend_from_slice(&(self.non_promotable.len() as u32).to_le_bytes());
        for child in &self.non_promotable {
            encode_node_id(child, &mut buf);
        }
        buf
    }

    /// Decode a staging-store record written by
    /// [`encode_record`](Dag::encode_record).
    pub(crate) fn decode_record(id: TreeId, bytes: &[u8]) -> BuildResult<Dag> {
        let mut reader = RecordReader { bytes, pos: 0 };
        let bucketed = reader.take_u8()? != 0;
        let state = match reader.take_u8()? {
            0 => DagState::Initialized,
            1 => DagState::Mirrored,
            2 => DagState::Changed,
            other => {
                return Err(BuildError::Encoding(format!("bad DAG state byte: {other}")));
            }
        };
        let original: [u8; 32] = reader.take(32)?.try_into().expect("32 bytes");
        let original_tree_id = ObjectId::from_hash(original);
        let child_count = reader.take_u64()?;
        let contents = if bucketed {
            let count = reader.take_u32()? as usize;
            let mut buckets = BTreeSet::new();
            for _ in 0..count {
                let len = reader.take_u8()? as usize;
                buckets.insert(TreeId::from_path(reader.take(len)?));
            }
            DagContents::Buckets(buckets)
        } else {
            let count = reader.take_u32()? as usize;
            let mut children = HashSet::with_capacity(count);
            for _ in 0..count {
                children.insert(decode_node_id(&mut reader)?);
            }
            DagContents::Leaf(children)
        };
        let count = reader.take_u32()? as usize;
        let mut non_promotable = HashSet::with_capacity(count);
        for _ in 0..count {
            non_promotable.insert(decode_node_id(&mut reader)?);
        }
        Ok(Dag {
            id,
            original_tree_id,
            child_count,
            state,
            contents,
            non_promotable,
        })
    }
}

fn encode_node_id(id: &NodeId, buf: &mut Vec<u8>) {
    let name = id.name().as_bytes();
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(name);
    match id.key() {
        ClusteringKey::Canonical { hash } => {
            buf.push(0);
            buf.extend_from_slice(&hash.to_le_bytes());
        }
        ClusteringKey::Quad { path } => {
            buf.push(1);
            debug_assert!(path.len() <= u8::MAX as usize);
            buf.push(path.len() as u8);
            buf.extend_from_slice(path);
        }
    }
}

fn decode_node_id(reader: &mut RecordReader<'_>) -> BuildResult<NodeId> {
    let name_len = reader.take_u32()? as usize;
    let name = std::str::from_utf8(reader.take(name_len)?)
        .map_err(|e| BuildError::Encoding(e.to_string()))?
        .to_owned();
    match reader.take_u8()? {
        0 => {
            // The canonical hash re-derives from the name; the stored copy
            // only keeps the record self-describing.
            let _ = reader.take_u64()?;
            Ok(NodeId::canonical(name))
        }
        1 => {
            let len = reader.take_u8()? as usize;
            Ok(NodeId::quad(name, reader.take(len)?.to_vec()))
        }
        other => Err(BuildError::Encoding(format!(
            "bad clustering key tag: {other}"
        ))),
    }
}

struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn take(&mut self, len: usize) -> BuildResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return Err(BuildError::Encoding("truncated DAG record".into()));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> BuildResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> BuildResult<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("4 bytes")))
    }

    fn take_u64(&mut self) -> BuildResult<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().expect("8 bytes")))
    }
}

/// A staged entry descriptor: either the entry itself or a reference into a
/// cached immutable tree, deferring materialization until the entry is
/// actually needed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DagNode {
    /// The entry, stored inline.
    Direct(Node),
    /// Entry number `index` of the given kind inside the tree registered
    /// under `tree_handle` in the session's [`TreeCache`].
    Lazy {
        tree_handle: u32,
        kind: NodeKind,
        index: usize,
    },
}

impl DagNode {
    /// Materialize the entry, loading its source tree through the cache if
    /// it was staged lazily.
    pub fn resolve(&self, cache: &TreeCache) -> BuildResult<Node> {
        match self {
            DagNode::Direct(node) => Ok(node.clone()),
            DagNode::Lazy {
                tree_handle,
                kind,
                index,
            } => {
                let tree: std::sync::Arc<RevTree> = cache.resolve(*tree_handle)?;
                let node = match kind {
                    NodeKind::Tree => &tree.tree_entries()[*index],
                    NodeKind::Feature => &tree.feature_entries()[*index],
                };
                Ok(node.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub() -> Dag {
        Dag::new(TreeId::root(), RevTree::empty_id())
    }

    // -----------------------------------------------------------------------
    // State machine
    // -----------------------------------------------------------------------

    #[test]
    fn new_dag_is_an_initialized_leaf() {
        let dag = stub();
        assert_eq!(dag.state(), DagState::Initialized);
        assert!(!dag.is_bucketed());
        assert_eq!(dag.num_children(), 0);
        assert_eq!(dag.child_count(), 0);
    }

    #[test]
    fn state_progresses_forward() {
        let mut dag = stub();
        dag.mark_mirrored();
        assert_eq!(dag.state(), DagState::Mirrored);
        dag.mark_changed();
        assert_eq!(dag.state(), DagState::Changed);
        // Changed stays changed.
        dag.mark_changed();
        assert_eq!(dag.state(), DagState::Changed);
    }

    #[test]
    #[should_panic(expected = "mirrored twice")]
    fn double_mirror_panics() {
        let mut dag = stub();
        dag.mark_mirrored();
        dag.mark_mirrored();
    }

    #[test]
    #[should_panic(expected = "mutated before being mirrored")]
    fn change_before_mirror_panics() {
        let mut dag = stub();
        dag.mark_changed();
    }

    // -----------------------------------------------------------------------
    // Contents
    // -----------------------------------------------------------------------

    #[test]
    fn children_insert_and_remove_report_membership() {
        let mut dag = stub();
        let id = NodeId::canonical("f1");
        assert!(dag.add_child(id.clone()));
        assert!(!dag.add_child(id.clone()));
        assert_eq!(dag.num_children(), 1);
        assert!(dag.remove_child(&id));
        assert!(!dag.remove_child(&id));
    }

    #[test]
    fn switch_to_buckets_drains_children() {
        let mut dag = stub();
        dag.add_child(NodeId::canonical("f1"));
        dag.add_child(NodeId::canonical("f2"));
        let drained = dag.switch_to_buckets();
        assert_eq!(drained.len(), 2);
        assert!(dag.is_bucketed());
        assert_eq!(dag.num_children(), 0);
        assert!(dag.add_bucket(TreeId::root().child(0)));
        assert_eq!(dag.num_buckets(), 1);
    }

    #[test]
    fn collapse_to_leaf_restores_members_and_clears_overflow() {
        let mut dag = stub();
        dag.switch_to_buckets();
        dag.add_bucket(TreeId::root().child(0));
        dag.add_non_promotable(NodeId::quad("boundless", vec![]));

        let members = vec![NodeId::canonical("f1"), NodeId::canonical("f2")];
        dag.collapse_to_leaf(members);
        assert!(!dag.is_bucketed());
        assert_eq!(dag.num_children(), 2);
        assert!(dag.non_promotable().is_empty());
    }

    #[test]
    #[should_panic(expected = "cannot add a direct child")]
    fn adding_child_to_bucketed_dag_panics() {
        let mut dag = stub();
        dag.switch_to_buckets();
        dag.add_child(NodeId::canonical("f1"));
    }

    #[test]
    #[should_panic(expected = "cannot add a bucket")]
    fn adding_bucket_to_leaf_panics() {
        let mut dag = stub();
        dag.add_bucket(TreeId::root().child(0));
    }

    // -----------------------------------------------------------------------
    // Record codec
    // -----------------------------------------------------------------------

    #[test]
    fn leaf_record_roundtrips() {
        let mut dag = Dag::new(TreeId::root().child(4), ObjectId::hash_of(b"orig"));
        dag.mark_mirrored();
        dag.add_child(NodeId::canonical("f1"));
        dag.add_child(NodeId::quad("q1", vec![0, 3, 1]));
        dag.mark_changed();
        dag.set_child_count(2);

        let record = dag.encode_record();
        let decoded = Dag::decode_record(TreeId::root().child(4), &record).unwrap();
        assert_eq!(decoded, dag);
    }

    #[test]
    fn bucketed_record_roundtrips() {
        let mut dag = Dag::new(TreeId::root(), ObjectId::hash_of(b"orig"));
        dag.mark_mirrored();
        dag.switch_to_buckets();
        dag.add_bucket(TreeId::root().child(0));
        dag.add_bucket(TreeId::root().child(31));
        dag.add_non_promotable(NodeId::quad("boundless", vec![]));
        dag.set_child_count(700);

        let record = dag.encode_record();
        let decoded = Dag::decode_record(TreeId::root(), &record).unwrap();
        assert_eq!(decoded, dag);
        assert_eq!(decoded.state(), DagState::Mirrored);
    }

    #[test]
    fn truncated_record_is_an_error() {
        let dag = stub();
        let record = dag.encode_record();
        let err = Dag::decode_record(TreeId::root(), &record[..record.len() - 3]).unwrap_err();
        assert!(matches!(err, crate::error::BuildError::Encoding(_)));
    }
}
