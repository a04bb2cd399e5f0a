//! Stable per-entry clustering identity.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use revtree_model::order;

/// The clustering payload carried alongside an entry name.
///
/// The payload is computed once when the entry enters the session, so the
/// entry lands in the same bucket sequence no matter how many DAGs it moves
/// through during promotions and demotions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusteringKey {
    /// Canonical strategy: the FNV-1a 64-bit hash of the entry name.
    Canonical { hash: u64 },
    /// Quadtree strategy: the precomputed quadrant path of the entry's
    /// bounds. Empty for boundless or straddling entries.
    Quad { path: Vec<u8> },
}

/// The identity of an entry inside the build-time DAG: its name plus the
/// clustering payload that determines its bucket at every depth.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    name: String,
    key: ClusteringKey,
}

impl NodeId {
    /// A canonical id: hashes the name.
    pub fn canonical(name: impl Into<String>) -> Self {
        let name = name.into();
        let hash = order::name_hash(&name);
        Self {
            name,
            key: ClusteringKey::Canonical { hash },
        }
    }

    /// A quadtree id with a precomputed quadrant path.
    pub fn quad(name: impl Into<String>, path: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            key: ClusteringKey::Quad { path },
        }
    }

    /// The entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The clustering payload.
    pub fn key(&self) -> &ClusteringKey {
        &self.key
    }

    /// The bucket this entry falls into at the given depth, or `None` when
    /// the entry cannot be promoted past that depth.
    pub fn bucket(&self, depth: usize) -> Option<u8> {
        match &self.key {
            ClusteringKey::Canonical { hash } => order::bucket(*hash, depth),
            ClusteringKey::Quad { path } => path.get(depth).copied(),
        }
    }
}

impl Ord for NodeId {
    /// Storage order of entries in a built tree: the bucket sequence first,
    /// the plain name as tie-break.
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.key, &other.key) {
            (ClusteringKey::Canonical { hash: a }, ClusteringKey::Canonical { hash: b }) => {
                order::compare(*a, &self.name, *b, &other.name)
            }
            (ClusteringKey::Quad { path: a }, ClusteringKey::Quad { path: b }) => {
                a.cmp(b).then_with(|| self.name.cmp(&other.name))
            }
            // Ids from different strategies never share a DAG; give them a
            // stable arbitrary order anyway so the total order holds.
            (ClusteringKey::Canonical { .. }, ClusteringKey::Quad { .. }) => Ordering::Less,
            (ClusteringKey::Quad { .. }, ClusteringKey::Canonical { .. }) => Ordering::Greater,
        }
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_id_buckets_follow_name_hash() {
        let id = NodeId::canonical("points/1");
        let hash = order::name_hash("points/1");
        for depth in 0..order::MAX_BUCKET_DEPTH {
            assert_eq!(id.bucket(depth), order::bucket(hash, depth));
        }
        assert_eq!(id.bucket(order::MAX_BUCKET_DEPTH), None);
    }

    #[test]
    fn canonical_order_matches_name_order() {
        let mut ids = vec![
            NodeId::canonical("f3"),
            NodeId::canonical("f1"),
            NodeId::canonical("f2"),
        ];
        ids.sort();
        for pair in ids.windows(2) {
            assert_eq!(
                order::compare_names(pair[0].name(), pair[1].name()),
                Ordering::Less
            );
        }
    }

    #[test]
    fn quad_id_exposes_its_path() {
        let id = NodeId::quad("road/7", vec![2, 0, 1]);
        assert_eq!(id.bucket(0), Some(2));
        assert_eq!(id.bucket(1), Some(0));
        assert_eq!(id.bucket(2), Some(1));
        assert_eq!(id.bucket(3), None);
    }

    #[test]
    fn empty_quad_path_is_never_promotable() {
        let id = NodeId::quad("boundless", vec![]);
        assert_eq!(id.bucket(0), None);
    }

    #[test]
    fn quad_order_is_path_then_name() {
        let a = NodeId::quad("z", vec![0, 1]);
        let b = NodeId::quad("a", vec![0, 2]);
        let c = NodeId::quad("b", vec![0, 2]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn ids_with_same_name_and_key_are_equal() {
        assert_eq!(NodeId::canonical("f1"), NodeId::canonical("f1"));
        assert_ne!(
            NodeId::quad("f1", vec![0]),
            NodeId::quad("f1", vec![1])
        );
    }
}
