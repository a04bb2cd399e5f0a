//! Bottom-up assembly of immutable trees from a mutation session.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::debug;

use revtree_model::{Bucket, Node, NodeKind, ObjectId, RevTree};
use revtree_store::{ObjectStore, StoreResult};

use crate::cluster::ClusteringStrategy;
use crate::dag::{Dag, DagState};
use crate::error::{BuildError, BuildResult};

/// How many finished trees accumulate before they are handed to the
/// background writer.
const FLUSH_BATCH: usize = 1000;

/// Writer threads draining finished trees into the target store.
const WRITER_THREADS: usize = 2;

fn build_pool() -> &'static rayon::ThreadPool {
    static POOL: OnceLock<rayon::ThreadPool> = OnceLock::new();
    POOL.get_or_init(|| {
        rayon::ThreadPoolBuilder::new()
            .thread_name(|i| format!("revtree-build-{i}"))
            .build()
            .expect("failed to create build pool")
    })
}

/// Assembles the immutable result tree of a [`ClusteringStrategy`] session.
///
/// Sibling buckets build in parallel on a shared pool; DAGs that never
/// diverged from their original tree resolve to the original's id without
/// rebuilding anything beneath them. Finished trees stream to the target
/// store in batches from background writer threads while the build is still
/// running.
pub struct DagTreeBuilder;

impl DagTreeBuilder {
    /// Build the session's tree and persist it (and every new subtree) to
    /// `target`.
    ///
    /// The session's staged state is disposed on return, success or not.
    pub fn build(
        strategy: &ClusteringStrategy,
        target: Arc<dyn ObjectStore>,
    ) -> BuildResult<RevTree> {
        let state = SharedState {
            strategy,
            new_trees: DashMap::new(),
            cancelled: AtomicBool::new(false),
            writer: StorageWriter::spawn(target, WRITER_THREADS),
        };
        let root = strategy.root_dag();
        let built = build_pool().install(|| state.build_dag(&root));
        let flushed = state.finish();
        strategy.dispose();
        let tree = built?;
        flushed?;
        debug!(
            size = tree.size(),
            num_trees = tree.num_trees(),
            bucketed = tree.is_bucketed(),
            "tree build complete"
        );
        Ok(tree)
    }
}

struct SharedState<'a> {
    strategy: &'a ClusteringStrategy,
    /// Trees built in this run, readable before the writer persists them.
    new_trees: DashMap<ObjectId, RevTree>,
    cancelled: AtomicBool,
    writer: StorageWriter,
}

impl SharedState<'_> {
    fn build_dag(&self, dag: &Dag) -> BuildResult<RevTree> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(BuildError::Cancelled);
        }
        let built = if dag.state() != DagState::Changed {
            // Untouched: the original tree is the result, verbatim.
            self.get_tree(&dag.original_tree_id())
        } else if dag.is_bucketed() {
            self.build_bucketed(dag)
        } else {
            self.build_leaf(dag)
        };
        let built = built.and_then(|tree| {
            self.stage_result(&tree)?;
            Ok(tree)
        });
        if built.is_err() {
            // Wave the siblings off before unwinding.
            self.cancelled.store(true, Ordering::Release);
        }
        built
    }

    fn build_leaf(&self, dag: &Dag) -> BuildResult<RevTree> {
        let children = dag.children().expect("leaf DAG holds children");
        debug_assert!(dag.non_promotable().is_empty());

        let mut tree_entries = Vec::new();
        let mut feature_entries = Vec::new();
        for node in self.strategy.nodes_sorted(children)? {
            if node.is_tombstone() {
                continue;
            }
            match node.kind() {
                NodeKind::Tree => tree_entries.push(node),
                NodeKind::Feature => feature_entries.push(node),
            }
        }

        let num_trees = tree_entries.len() as u64;
        let mut size = feature_entries.len() as u64;
        for entry in &tree_entries {
            size += self.get_tree(&entry.object_id())?.size();
        }
        Ok(RevTree::build(
            size,
            num_trees,
            tree_entries,
            feature_entries,
            BTreeMap::new(),
        ))
    }

    fn build_bucketed(&self, dag: &Dag) -> BuildResult<RevTree> {
        let bucket_ids: Vec<_> = dag
            .buckets()
            .expect("bucketed DAG holds buckets")
            .iter()
            .cloned()
            .collect();
        let bucket_dags = self.strategy.get_dags(&bucket_ids)?;

        let built: Vec<(u8, RevTree)> = bucket_dags
            .par_iter()
            .map(|bucket_dag| {
                let index = bucket_dag
                    .id()
                    .leaf_bucket()
                    .expect("bucket DAG has a parent");
                let tree = self.build_dag(bucket_dag)?;
                Ok((index, tree))
            })
            .collect::<BuildResult<_>>()?;

        let mut buckets = BTreeMap::new();
        let mut size = 0u64;
        let mut num_trees = 0u64;
        for (index, tree) in built {
            if tree.is_empty() {
                continue;
            }
            size += tree.size();
            num_trees += tree.num_trees();
            buckets.insert(index, Bucket::new(tree.id(), tree.bounds()));
        }

        // Overflow entries become the node's own feature entries.
        let mut residuals: Vec<Node> = Vec::new();
        for node in self.strategy.nodes_sorted(dag.non_promotable())? {
            if node.is_tombstone() {
                continue;
            }
            residuals.push(node);
        }
        size += residuals.len() as u64;

        Ok(RevTree::build(size, num_trees, vec![], residuals, buckets))
    }

    /// Read a tree: this run's output first, then the session cache.
    fn get_tree(&self, id: &ObjectId) -> BuildResult<RevTree> {
        if let Some(tree) = self.new_trees.get(id) {
            return Ok(tree.clone());
        }
        Ok((*self.strategy.storage().get_tree(id)?).clone())
    }

    fn stage_result(&self, tree: &RevTree) -> BuildResult<()> {
        self.new_trees.insert(tree.id(), tree.clone());
        if self.new_trees.len() >= FLUSH_BATCH {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> BuildResult<()> {
        let ids: Vec<ObjectId> = self.new_trees.iter().map(|e| *e.key()).collect();
        let mut batch = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some((_, tree)) = self.new_trees.remove(&id) {
                batch.push(tree);
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        debug!(trees = batch.len(), "flushing finished trees to the writer");
        self.writer.submit(batch)
    }

    /// Drain the remaining trees and wait for the writer to persist
    /// everything.
    fn finish(&self) -> BuildResult<()> {
        let flushed = self.flush();
        let joined = self.writer.finish();
        flushed?;
        joined
    }
}

/// Background threads persisting tree batches to the target store.
struct StorageWriter {
    sender: Mutex<Option<Sender<Vec<RevTree>>>>,
    workers: Mutex<Vec<JoinHandle<StoreResult<()>>>>,
}

impl StorageWriter {
    fn spawn(target: Arc<dyn ObjectStore>, threads: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Vec<RevTree>>();
        let workers = (0..threads)
            .map(|i| {
                let receiver = receiver.clone();
                let target = Arc::clone(&target);
                std::thread::Builder::new()
                    .name(format!("revtree-writer-{i}"))
                    .spawn(move || {
                        while let Ok(batch) = receiver.recv() {
                            target.put_all(&batch)?;
                        }
                        Ok(())
                    })
                    .expect("failed to spawn writer thread")
            })
            .collect();
        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    fn submit(&self, batch: Vec<RevTree>) -> BuildResult<()> {
        let sender = self.sender.lock().expect("lock poisoned");
        let sender = sender.as_ref().ok_or(BuildError::WriterClosed)?;
        sender.send(batch).map_err(|_| BuildError::WriterClosed)
    }

    /// Close the channel and wait for the workers; the first store error
    /// wins.
    fn finish(&self) -> BuildResult<()> {
        self.sender.lock().expect("lock poisoned").take();
        let workers = std::mem::take(&mut *self.workers.lock().expect("lock poisoned"));
        let mut result = Ok(());
        for worker in workers {
            let outcome = worker
                .join()
                .unwrap_or_else(|_| panic!("writer thread panicked"));
            if let (Err(err), Ok(())) = (outcome, &result) {
                result = Err(BuildError::Store(err));
            }
        }
        result
    }
}
