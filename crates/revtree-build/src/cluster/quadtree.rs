use revtree_model::{Envelope, Node, NodeKind};

use crate::cluster::ClusteringPolicy;
use crate::node_id::NodeId;
use crate::quadrant::quadrants_by_depth;

/// Maximum number of features a quadtree node holds before splitting.
pub const QUAD_SIZE_LIMIT: usize = 128;

/// The quadtree clustering policy: features are placed by the quadrant path
/// of their bounding box inside a fixed world envelope.
///
/// The quadrant path is computed once, when the entry enters the session,
/// and carried in its [`NodeId`]; features whose bounds straddle a split
/// line stop descending at that cell and stay there as non-promotable
/// entries. Subtree entries are not spatially indexed and are excluded from
/// placement entirely.
#[derive(Debug)]
pub struct QuadtreePolicy {
    max_bounds: Envelope,
    max_depth: usize,
}

impl QuadtreePolicy {
    /// A policy over the given world envelope, splitting at most
    /// `max_depth` levels deep.
    pub fn new(max_bounds: Envelope, max_depth: usize) -> Self {
        Self {
            max_bounds,
            max_depth,
        }
    }

    /// The world envelope all indexed bounds must fall inside.
    pub fn max_bounds(&self) -> &Envelope {
        &self.max_bounds
    }

    /// The deepest level the tree may split to.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl ClusteringPolicy for QuadtreePolicy {
    fn compute_id(&self, node: &Node) -> Option<NodeId> {
        if node.kind() != NodeKind::Feature {
            return None;
        }
        let path = quadrants_by_depth(node.bounds().as_ref(), &self.max_bounds, self.max_depth);
        Some(NodeId::quad(node.name(), path))
    }

    fn max_buckets_for_depth(&self, _depth_index: usize) -> u32 {
        4
    }

    fn normalized_size_limit(&self, _depth_index: usize) -> usize {
        QUAD_SIZE_LIMIT
    }
}
