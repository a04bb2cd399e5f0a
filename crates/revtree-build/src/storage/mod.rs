//! Pluggable storage for the build-time DAG and its staged node
//! descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use revtree_model::{ObjectId, RevTree};

use crate::cache::TreeCache;
use crate::dag::{Dag, DagNode};
use crate::error::BuildResult;
use crate::node_id::NodeId;
use crate::tree_id::TreeId;

mod caching;
mod heap;
mod sled_backend;

pub use caching::{CachingDagStorageProvider, MigrationPolicy, NeverMigrate};
pub use heap::HeapDagStorageProvider;
pub use sled_backend::SledDagStorageProvider;

/// Storage backing one clustering session: the DAG nodes keyed by bucket
/// path, the staged entry descriptors keyed by [`NodeId`], and a shared
/// [`TreeCache`] over the originating object store.
///
/// DAGs move by value: callers load a DAG, mutate their copy, and save it
/// back. Implementations must keep `get_or_create_dag` idempotent, and must
/// persist the stub they create so a later load observes it.
pub trait DagStorageProvider: Send + Sync {
    /// The session's tree cache.
    fn tree_cache(&self) -> &Arc<TreeCache>;

    /// Read an immutable tree through the session cache.
    fn get_tree(&self, id: &ObjectId) -> BuildResult<Arc<RevTree>> {
        self.tree_cache().get_tree(id)
    }

    /// Load the DAG at `id`, creating a stub over `original` if absent.
    fn get_or_create_dag(&self, id: &TreeId, original: &ObjectId) -> BuildResult<Dag>;

    /// Load a batch of DAGs that are known to exist.
    ///
    /// Panics if any id is absent; callers only ask for bucket ids they
    /// registered themselves.
    fn get_dags(&self, ids: &[TreeId]) -> BuildResult<Vec<Dag>>;

    /// Persist a DAG, replacing any previous value under its id.
    fn save_dag(&self, dag: &Dag) -> BuildResult<()>;

    /// Persist a batch of DAGs.
    fn save_dags(&self, dags: &[Dag]) -> BuildResult<()> {
        for dag in dags {
            self.save_dag(dag)?;
        }
        Ok(())
    }

    /// Load a staged entry descriptor.
    ///
    /// Returns [`BuildError::NodeNotFound`](crate::BuildError::NodeNotFound)
    /// if the id was never staged.
    fn get_node(&self, id: &NodeId) -> BuildResult<DagNode>;

    /// Stage an entry descriptor, replacing any previous one under the same
    /// id.
    fn save_node(&self, id: NodeId, node: DagNode) -> BuildResult<()>;

    /// Stage a batch of entry descriptors.
    fn save_nodes(&self, nodes: HashMap<NodeId, DagNode>) -> BuildResult<()> {
        for (id, node) in nodes {
            self.save_node(id, node)?;
        }
        Ok(())
    }

    /// Number of distinct staged entry descriptors.
    fn node_count(&self) -> u64;

    /// Drain all staged state, for handing over to another provider.
    fn export_state(&self) -> BuildResult<(Vec<Dag>, Vec<(NodeId, DagNode)>)>;

    /// Release all staged state and temporary resources.
    fn dispose(&self);
}
