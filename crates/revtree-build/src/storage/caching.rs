use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use revtree_model::ObjectId;
use revtree_store::ObjectStore;

use crate::cache::TreeCache;
use crate::dag::{Dag, DagNode};
use crate::error::BuildResult;
use crate::node_id::NodeId;
use crate::storage::{DagStorageProvider, HeapDagStorageProvider};
use crate::tree_id::TreeId;

/// Decides if and where staged state should move once it grows past what
/// the current backend handles well.
pub trait MigrationPolicy: Send + Sync {
    /// Whether the given number of staged entries warrants a migration.
    fn should_migrate(&self, node_count: u64) -> bool;

    /// An empty replacement provider sharing the session's tree cache.
    ///
    /// Only called after [`should_migrate`](MigrationPolicy::should_migrate)
    /// returned `true`; the caller moves the staged state over.
    fn target(&self, cache: Arc<TreeCache>) -> BuildResult<Box<dyn DagStorageProvider>>;
}

/// The default policy: all staged state stays on the heap.
pub struct NeverMigrate;

impl MigrationPolicy for NeverMigrate {
    fn should_migrate(&self, _node_count: u64) -> bool {
        false
    }

    fn target(&self, _cache: Arc<TreeCache>) -> BuildResult<Box<dyn DagStorageProvider>> {
        panic!("NeverMigrate has no migration target")
    }
}

/// A provider that starts on the heap and hands its staged state to a
/// policy-chosen backend once the node count crosses the policy's
/// threshold.
///
/// The tree cache is owned here and shared with every delegate, so lazy
/// node descriptors keep resolving across a migration.
pub struct CachingDagStorageProvider {
    cache: Arc<TreeCache>,
    policy: Box<dyn MigrationPolicy>,
    delegate: RwLock<Box<dyn DagStorageProvider>>,
    migrated: AtomicBool,
}

impl CachingDagStorageProvider {
    /// Create a provider that never migrates.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_policy(store, Box::new(NeverMigrate))
    }

    /// Create a provider with an explicit migration policy.
    pub fn with_policy(store: Arc<dyn ObjectStore>, policy: Box<dyn MigrationPolicy>) -> Self {
        let cache = Arc::new(TreeCache::with_default_capacity(store));
        let delegate = HeapDagStorageProvider::with_cache(Arc::clone(&cache));
        Self {
            cache,
            policy,
            delegate: RwLock::new(Box::new(delegate)),
            migrated: AtomicBool::new(false),
        }
    }

    /// Migration is a one-way crossover: once the state has moved, the
    /// policy is never consulted again.
    fn maybe_migrate(&self) -> BuildResult<()> {
        if self.migrated.load(Ordering::Acquire) {
            return Ok(());
        }
        {
            let delegate = self.delegate.read().expect("lock poisoned");
            if !self.policy.should_migrate(delegate.node_count()) {
                return Ok(());
            }
        }
        let mut delegate = self.delegate.write().expect("lock poisoned");
        // Recheck: another writer may have migrated while we waited.
        if self.migrated.load(Ordering::Acquire) {
            return Ok(());
        }
        let target = self.policy.target(Arc::clone(&self.cache))?;
        let (dags, nodes) = delegate.export_state()?;
        debug!(
            dags = dags.len(),
            nodes = nodes.len(),
            "migrating staged DAG state to new backend"
        );
        target.save_dags(&dags)?;
        target.save_nodes(nodes.into_iter().collect())?;
        delegate.dispose();
        *delegate = target;
        self.migrated.store(true, Ordering::Release);
        Ok(())
    }
}

impl DagStorageProvider for CachingDagStorageProvider {
    fn tree_cache(&self) -> &Arc<TreeCache> {
        &self.cache
    }

    fn get_or_create_dag(&self, id: &TreeId, original: &ObjectId) -> BuildResult<Dag> {
        self.delegate
            .read()
            .expect("lock poisoned")
            .get_or_create_dag(id, original)
    }

    fn get_dags(&self, ids: &[TreeId]) -> BuildResult<Vec<Dag>> {
        self.delegate.read().expect("lock poisoned").get_dags(ids)
    }

    fn save_dag(&self, dag: &Dag) -> BuildResult<()> {
        self.delegate.read().expect("lock poisoned").save_dag(dag)
    }

    fn save_dags(&self, dags: &[Dag]) -> BuildResult<()> {
        self.delegate.read().expect("lock poisoned").save_dags(dags)
    }

    fn get_node(&self, id: &NodeId) -> BuildResult<DagNode> {
        self.delegate.read().expect("lock poisoned").get_node(id)
    }

    fn save_node(&self, id: NodeId, node: DagNode) -> BuildResult<()> {
        self.delegate
            .read()
            .expect("lock poisoned")
            .save_node(id, node)?;
        self.maybe_migrate()
    }

    fn save_nodes(&self, nodes: HashMap<NodeId, DagNode>) -> BuildResult<()> {
        self.delegate
            .read()
            .expect("lock poisoned")
            .save_nodes(nodes)?;
        self.maybe_migrate()
    }

    fn node_count(&self) -> u64 {
        self.delegate.read().expect("lock poisoned").node_count()
    }

    fn export_state(&self) -> BuildResult<(Vec<Dag>, Vec<(NodeId, DagNode)>)> {
        self.delegate.read().expect("lock poisoned").export_state()
    }

    fn dispose(&self) {
        self.delegate.read().expect("lock poisoned").dispose();
    }
}
