use revtree_model::{order, Node};

use crate::cluster::ClusteringPolicy;
use crate::node_id::NodeId;

/// The canonical clustering policy: every entry is placed by the FNV-1a
/// hash of its name, per the fan-out and size-limit tables in
/// [`revtree_model::order`].
///
/// This is the policy that gives a set of entries exactly one possible tree
/// shape, so equal contents always hash to equal tree ids.
#[derive(Debug, Default)]
pub struct CanonicalPolicy;

impl ClusteringPolicy for CanonicalPolicy {
    fn compute_id(&self, node: &Node) -> Option<NodeId> {
        Some(NodeId::canonical(node.name()))
    }

    fn max_buckets_for_depth(&self, depth_index: usize) -> u32 {
        order::max_buckets_for_level(depth_index)
    }

    fn normalized_size_limit(&self, depth_index: usize) -> usize {
        order::normalized_size_limit(depth_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revtree_model::{NodeKind, ObjectId};

    #[test]
    fn every_entry_gets_an_id() {
        let policy = CanonicalPolicy;
        let feature = Node::feature("f1", ObjectId::hash_of(b"f1"), None);
        let tree = Node::tree("sub", ObjectId::hash_of(b"sub"), None);
        assert_eq!(policy.compute_id(&feature), Some(NodeId::canonical("f1")));
        assert_eq!(policy.compute_id(&tree), Some(NodeId::canonical("sub")));
        assert_eq!(feature.kind(), NodeKind::Feature);
    }

    #[test]
    fn id_ignores_object_id_and_bounds() {
        let policy = CanonicalPolicy;
        let a = Node::feature("f1", ObjectId::hash_of(b"v1"), None);
        let b = Node::feature("f1", ObjectId::hash_of(b"v2"), None);
        assert_eq!(policy.compute_id(&a), policy.compute_id(&b));
    }

    #[test]
    fn limits_follow_the_canonical_tables() {
        let policy = CanonicalPolicy;
        assert_eq!(policy.max_buckets_for_depth(0), 32);
        assert_eq!(policy.normalized_size_limit(0), 512);
        assert_eq!(policy.max_buckets_for_depth(3), 8);
        assert_eq!(policy.normalized_size_limit(3), 256);
    }
}
