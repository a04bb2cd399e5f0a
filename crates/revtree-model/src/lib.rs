//! Foundation types for the revision-tree engine.
//!
//! This crate provides the immutable, content-addressed data model shared by
//! the storage boundary and the tree builder. Every other crate in the
//! workspace depends on `revtree-model`.
//!
//! # Key Types
//!
//! - [`ObjectId`] — Content-addressed identifier (BLAKE3 hash)
//! - [`Envelope`] — 2-D bounding box used for spatial bucketing
//! - [`Node`] — A named tree entry (feature or subtree pointer)
//! - [`Bucket`] — A subtree slot of a bucketed tree node
//! - [`RevTree`] — An immutable revision-tree snapshot node
//! - [`order`] — The canonical (hash based) node name ordering

pub mod error;
pub mod geom;
pub mod node;
pub mod object;
pub mod order;
pub mod tree;

pub use error::ModelError;
pub use geom::Envelope;
pub use node::{Bucket, Node, NodeKind};
pub use object::ObjectId;
pub use tree::RevTree;
