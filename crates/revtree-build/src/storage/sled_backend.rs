use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::debug;

use revtree_model::ObjectId;
use revtree_store::ObjectStore;

use crate::cache::TreeCache;
use crate::dag::{Dag, DagNode};
use crate::error::{BuildError, BuildResult};
use crate::node_id::NodeId;
use crate::storage::DagStorageProvider;
use crate::tree_id::TreeId;

/// Disk-backed DAG storage in a temporary sled database.
///
/// DAGs are keyed by their raw bucket path, so siblings sort next to each
/// other on disk and parents precede children. The database lives in a
/// fresh temporary directory that is removed when the provider is dropped;
/// staged state never outlives the session.
pub struct SledDagStorageProvider {
    _dir: TempDir,
    dags: sled::Tree,
    nodes: sled::Tree,
    cache: Arc<TreeCache>,
    node_count: AtomicU64,
}

impl SledDagStorageProvider {
    /// Create a provider with its own default-sized cache over `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> BuildResult<Self> {
        Self::with_cache(Arc::new(TreeCache::with_default_capacity(store)))
    }

    /// Create a provider sharing an existing tree cache.
    pub fn with_cache(cache: Arc<TreeCache>) -> BuildResult<Self> {
        let dir = TempDir::with_prefix("revtree-dag-")?;
        let db = sled::Config::new().path(dir.path()).open()?;
        let dags = db.open_tree("dags")?;
        let nodes = db.open_tree("nodes")?;
        debug!(path = %dir.path().display(), "opened temporary DAG database");
        Ok(Self {
            _dir: dir,
            dags,
            nodes,
            cache,
            node_count: AtomicU64::new(0),
        })
    }

    fn node_key(id: &NodeId) -> BuildResult<Vec<u8>> {
        bincode::serialize(id).map_err(|e| BuildError::Encoding(e.to_string()))
    }
}

impl DagStorageProvider for SledDagStorageProvider {
    fn tree_cache(&self) -> &Arc<TreeCache> {
        &self.cache
    }

    fn get_or_create_dag(&self, id: &TreeId, original: &ObjectId) -> BuildResult<Dag> {
        if let Some(bytes) = self.dags.get(id.as_bytes())? {
            return Dag::decode_record(id.clone(), &bytes);
        }
        let dag = Dag::new(id.clone(), *original);
        self.save_dag(&dag)?;
        Ok(dag)
    }

    fn get_dags(&self, ids: &[TreeId]) -> BuildResult<Vec<Dag>> {
        ids.iter()
            .map(|id| {
                let bytes = self
                    .dags
                    .get(id.as_bytes())?
                    .unwrap_or_else(|| panic!("DAG not found: {id:?}"));
                Dag::decode_record(id.clone(), &bytes)
            })
            .collect()
    }

    fn save_dag(&self, dag: &Dag) -> BuildResult<()> {
        self.dags.insert(dag.id().as_bytes(), dag.encode_record())?;
        Ok(())
    }

    fn save_dags(&self, dags: &[Dag]) -> BuildResult<()> {
        let mut batch = sled::Batch::default();
        for dag in dags {
            batch.insert(dag.id().as_bytes(), dag.encode_record());
        }
        self.dags.apply_batch(batch)?;
        Ok(())
    }

    fn get_node(&self, id: &NodeId) -> BuildResult<DagNode> {
        let key = Self::node_key(id)?;
        let bytes = self
            .nodes
            .get(key)?
            .ok_or_else(|| BuildError::NodeNotFound(id.name().to_owned()))?;
        bincode::deserialize(&bytes).map_err(|e| BuildError::Encoding(e.to_string()))
    }

    fn save_node(&self, id: NodeId, node: DagNode) -> BuildResult<()> {
        let key = Self::node_key(&id)?;
        let value = bincode::serialize(&node).map_err(|e| BuildError::Encoding(e.to_string()))?;
        if self.nodes.insert(key, value)?.is_none() {
            self.node_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn save_nodes(&self, nodes: HashMap<NodeId, DagNode>) -> BuildResult<()> {
        for (id, node) in nodes {
            self.save_node(id, node)?;
        }
        Ok(())
    }

    fn node_count(&self) -> u64 {
        self.node_count.load(Ordering::Relaxed)
    }

    fn export_state(&self) -> BuildResult<(Vec<Dag>, Vec<(NodeId, DagNode)>)> {
        let mut dags = Vec::new();
        for entry in self.dags.iter() {
            let (key, bytes) = entry?;
            dags.push(Dag::decode_record(TreeId::from_path(key.to_vec()), &bytes)?);
        }
        let mut nodes = Vec::new();
        for entry in self.nodes.iter() {
            let (key, value) = entry?;
            let id: NodeId =
                bincode::deserialize(&key).map_err(|e| BuildError::Encoding(e.to_string()))?;
            let node: DagNode =
                bincode::deserialize(&value).map_err(|e| BuildError::Encoding(e.to_string()))?;
            nodes.push((id, node));
        }
        Ok((dags, nodes))
    }

    fn dispose(&self) {
        let _ = self.dags.clear();
        let _ = self.nodes.clear();
        self.node_count.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for SledDagStorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledDagStorageProvider")
            .field("nodes", &self.node_count())
            .finish()
    }
}
