//! Build-time identity of a DAG node: its bucket path from the root.

use serde::{Deserialize, Serialize};

/// The position of a DAG node in the build-time tree, expressed as the
/// sequence of bucket indices walked from the root.
///
/// The root is the empty path; the DAG at bucket 3 under root bucket 1 is
/// `[1, 3]`. The derived ordering (lexicographic over the byte path, parents
/// before children) is what keeps sibling DAGs grouped in disk-backed
/// storage.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TreeId(Vec<u8>);

impl TreeId {
    /// The root DAG's id: the empty path.
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Build an id from an explicit bucket path.
    pub fn from_path(path: impl Into<Vec<u8>>) -> Self {
        Self(path.into())
    }

    /// The id of this node's child in the given bucket.
    pub fn child(&self, bucket: u8) -> TreeId {
        let mut path = Vec::with_capacity(self.0.len() + 1);
        path.extend_from_slice(&self.0);
        path.push(bucket);
        Self(path)
    }

    /// How many levels below the root this node sits.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the root id.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The bucket index this node occupies within its parent, if any.
    pub fn leaf_bucket(&self) -> Option<u8> {
        self.0.last().copied()
    }

    /// The bucket index walked at the given depth.
    ///
    /// Panics if `depth` is at or past this id's own depth.
    pub fn bucket_index(&self, depth: usize) -> u8 {
        self.0[depth]
    }

    /// The raw bucket path.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for TreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TreeId{:?}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty_path() {
        let root = TreeId::root();
        assert!(root.is_root());
        assert_eq!(root.depth(), 0);
        assert_eq!(root.leaf_bucket(), None);
    }

    #[test]
    fn child_extends_the_path() {
        let id = TreeId::root().child(1).child(3);
        assert_eq!(id.as_bytes(), &[1, 3]);
        assert_eq!(id.depth(), 2);
        assert_eq!(id.leaf_bucket(), Some(3));
        assert_eq!(id.bucket_index(0), 1);
        assert_eq!(id.bucket_index(1), 3);
    }

    #[test]
    fn ordering_groups_siblings_after_parent() {
        let root = TreeId::root();
        let a = root.child(0);
        let b = root.child(1);
        let a0 = a.child(0);
        assert!(root < a);
        assert!(a < a0);
        assert!(a0 < b);
    }

    #[test]
    fn from_path_roundtrips() {
        let id = TreeId::from_path(vec![2, 0, 7]);
        assert_eq!(id, TreeId::root().child(2).child(0).child(7));
    }
}
