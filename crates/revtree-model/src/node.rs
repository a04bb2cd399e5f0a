//! Tree entries and bucket pointers.

use serde::{Deserialize, Serialize};

use crate::geom::Envelope;
use crate::object::ObjectId;

/// What a [`Node`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A nested [`RevTree`](crate::RevTree).
    Tree,
    /// A feature object (the leaves of the dataset).
    Feature,
}

/// A named entry of a revision tree: a feature or a subtree pointer.
///
/// A node whose `object_id` is [null](ObjectId::null) is a tombstone marking
/// a pending removal; tombstones never appear in a built tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    object_id: ObjectId,
    kind: NodeKind,
    bounds: Option<Envelope>,
}

impl Node {
    /// Create a new entry.
    pub fn new(
        name: impl Into<String>,
        object_id: ObjectId,
        kind: NodeKind,
        bounds: Option<Envelope>,
    ) -> Self {
        Self {
            name: name.into(),
            object_id,
            kind,
            bounds,
        }
    }

    /// Shorthand for a feature entry.
    pub fn feature(name: impl Into<String>, object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self::new(name, object_id, NodeKind::Feature, bounds)
    }

    /// Shorthand for a subtree entry.
    pub fn tree(name: impl Into<String>, object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self::new(name, object_id, NodeKind::Tree, bounds)
    }

    /// The entry name, unique among its siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The content id of the target object.
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Whether this entry points to a subtree or a feature.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The entry's bounding box, if it has one.
    pub fn bounds(&self) -> Option<Envelope> {
        self.bounds
    }

    /// Returns `true` if this entry is a deletion tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.object_id.is_null()
    }

    /// A copy of this node pointing at a different object.
    ///
    /// `with_object_id(ObjectId::null())` is how removals are expressed.
    pub fn with_object_id(&self, object_id: ObjectId) -> Self {
        Self {
            name: self.name.clone(),
            object_id,
            kind: self.kind,
            bounds: self.bounds,
        }
    }
}

/// One child slot of a bucketed tree node: the subtree's id plus the
/// aggregate bounds of everything reachable through it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    object_id: ObjectId,
    bounds: Option<Envelope>,
}

impl Bucket {
    /// Create a bucket pointer.
    pub fn new(object_id: ObjectId, bounds: Option<Envelope>) -> Self {
        Self { object_id, bounds }
    }

    /// The id of the subtree this bucket points at.
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// Aggregate bounds of the bucket's contents.
    pub fn bounds(&self) -> Option<Envelope> {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_detection() {
        let live = Node::feature("f1", ObjectId::hash_of(b"f1"), None);
        assert!(!live.is_tombstone());
        let dead = live.with_object_id(ObjectId::null());
        assert!(dead.is_tombstone());
        assert_eq!(dead.name(), "f1");
        assert_eq!(dead.kind(), NodeKind::Feature);
    }

    #[test]
    fn with_object_id_preserves_bounds() {
        let bounds = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let node = Node::feature("f", ObjectId::hash_of(b"f"), Some(bounds));
        let updated = node.with_object_id(ObjectId::hash_of(b"g"));
        assert_eq!(updated.bounds(), Some(bounds));
    }

    #[test]
    fn kinds_are_distinct() {
        let t = Node::tree("roads", ObjectId::hash_of(b"roads"), None);
        let f = Node::feature("roads", ObjectId::hash_of(b"roads"), None);
        assert_ne!(t, f);
    }
}
