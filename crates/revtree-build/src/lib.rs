//! Revision-tree construction: the mutable DAG a mutation session edits and
//! the builder that turns it back into immutable, content-addressed trees.
//!
//! The flow is always the same:
//!
//! 1. Open a [`ClusteringStrategy`] session over an existing tree (or the
//!    empty tree) with a [`DagStorageProvider`] for the staged state.
//! 2. Apply inserts, updates and removals. The session mirrors the original
//!    tree's structure lazily and only materializes the parts a mutation
//!    actually touches.
//! 3. Hand the session to [`DagTreeBuilder::build`], which assembles the
//!    result bottom-up, reuses every untouched subtree by id, and streams
//!    new trees to the target store as they finish.
//!
//! Two clustering policies are provided: [`CanonicalPolicy`] (name-hash
//! placement, one deterministic shape per content) and [`QuadtreePolicy`]
//! (spatial placement by bounding-box quadrant).
//!
//! # Invariants
//!
//! - A session is single-writer; all mutations serialize on its lock.
//! - Every DAG's `child_count` equals its recursive membership at all
//!   times; the collapse path asserts this.
//! - Build output never contains tombstones or empty buckets.

pub mod builder;
pub mod cache;
pub mod cluster;
pub mod dag;
pub mod error;
pub mod node_id;
pub mod quadrant;
pub mod storage;
pub mod tree_id;

pub use builder::DagTreeBuilder;
pub use cache::TreeCache;
pub use cluster::{
    CanonicalPolicy, ClusteringPolicy, ClusteringStrategy, QuadtreePolicy, QUAD_SIZE_LIMIT,
};
pub use dag::{Dag, DagNode, DagState};
pub use error::{BuildError, BuildResult};
pub use node_id::{ClusteringKey, NodeId};
pub use quadrant::Quadrant;
pub use storage::{
    CachingDagStorageProvider, DagStorageProvider, HeapDagStorageProvider, MigrationPolicy,
    NeverMigrate, SledDagStorageProvider,
};
pub use tree_id::TreeId;
