use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use revtree_model::ObjectId;
use revtree_store::ObjectStore;

use crate::cache::TreeCache;
use crate::dag::{Dag, DagNode};
use crate::error::{BuildError, BuildResult};
use crate::node_id::NodeId;
use crate::storage::DagStorageProvider;
use crate::tree_id::TreeId;

/// All-in-memory DAG storage over concurrent hash maps.
///
/// The fastest provider, suitable as long as the staged state fits in
/// memory. For very large imports, wrap it in a
/// [`CachingDagStorageProvider`](crate::CachingDagStorageProvider) with a
/// migration policy that spills to disk.
pub struct HeapDagStorageProvider {
    dags: DashMap<TreeId, Dag>,
    nodes: DashMap<NodeId, DagNode>,
    cache: Arc<TreeCache>,
}

impl HeapDagStorageProvider {
    /// Create a provider with its own default-sized cache over `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_cache(Arc::new(TreeCache::with_default_capacity(store)))
    }

    /// Create a provider sharing an existing tree cache.
    pub fn with_cache(cache: Arc<TreeCache>) -> Self {
        Self {
            dags: DashMap::new(),
            nodes: DashMap::new(),
            cache,
        }
    }

    /// Number of DAGs currently held.
    pub fn dag_count(&self) -> usize {
        self.dags.len()
    }
}

impl DagStorageProvider for HeapDagStorageProvider {
    fn tree_cache(&self) -> &Arc<TreeCache> {
        &self.cache
    }

    fn get_or_create_dag(&self, id: &TreeId, original: &ObjectId) -> BuildResult<Dag> {
        let dag = self
            .dags
            .entry(id.clone())
            .or_insert_with(|| Dag::new(id.clone(), *original));
        Ok(dag.clone())
    }

    fn get_dags(&self, ids: &[TreeId]) -> BuildResult<Vec<Dag>> {
        ids.iter()
            .map(|id| {
                let dag = self
                    .dags
                    .get(id)
                    .unwrap_or_else(|| panic!("DAG not found: {id:?}"));
                Ok(dag.clone())
            })
            .collect()
    }

    fn save_dag(&self, dag: &Dag) -> BuildResult<()> {
        self.dags.insert(dag.id().clone(), dag.clone());
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> BuildResult<DagNode> {
        self.nodes
            .get(id)
            .map(|node| node.clone())
            .ok_or_else(|| BuildError::NodeNotFound(id.name().to_owned()))
    }

    fn save_node(&self, id: NodeId, node: DagNode) -> BuildResult<()> {
        self.nodes.insert(id, node);
        Ok(())
    }

    fn save_nodes(&self, nodes: HashMap<NodeId, DagNode>) -> BuildResult<()> {
        for (id, node) in nodes {
            self.nodes.insert(id, node);
        }
        Ok(())
    }

    fn node_count(&self) -> u64 {
        self.nodes.len() as u64
    }

    fn export_state(&self) -> BuildResult<(Vec<Dag>, Vec<(NodeId, DagNode)>)> {
        let dags = self.dags.iter().map(|e| e.value().clone()).collect();
        let nodes = self
            .nodes
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        Ok((dags, nodes))
    }

    fn dispose(&self) {
        self.dags.clear();
        self.nodes.clear();
    }
}

impl std::fmt::Debug for HeapDagStorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapDagStorageProvider")
            .field("dags", &self.dags.len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
