use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::api::{FitError, JobInfo, NodeInfo, QueueInfo, TaskInfo};
use crate::binder::Binder;
use crate::cache::Snapshot;
use crate::config::SchedTuning;

pub type CompareFn<T> = Box<dyn Fn(&T, &T) -> Ordering + Send + Sync>;
pub type PredicateFn = Box<dyn Fn(&TaskInfo, &NodeInfo) -> Result<(), FitError> + Send + Sync>;
pub type NodeOrderFn = Box<dyn Fn(&TaskInfo, &NodeInfo) -> f64 + Send + Sync>;
pub type BatchNodeOrderFn =
    Box<dyn Fn(&TaskInfo, &[NodeInfo]) -> HashMap<String, f64> + Send + Sync>;
pub type NodeReduceFn = Box<dyn Fn(&mut HashMap<String, f64>) + Send + Sync>;
/// Returns a rejection reason when the job must not be scheduled this cycle.
pub type JobValidFn = Box<dyn Fn(&JobInfo) -> Option<String> + Send + Sync>;
pub type JobReadyFn = Box<dyn Fn(&JobInfo) -> bool + Send + Sync>;
pub type OverusedFn = Box<dyn Fn(&QueueInfo) -> bool + Send + Sync>;

/// Per-cycle snapshot of the cluster plus the capability set assembled by
/// plugins at session open.
///
/// The session is owned by exactly one scheduling cycle. Node and job state
/// live in `DashMap`s so a `Statement` can mutate them through a shared
/// borrow while the cycle keeps reading the capability set.
pub struct Session {
    pub uid: Uuid,
    /// Shared handles so plugin closures can observe allocations made later
    /// in the same cycle (queue shares shift as statements allocate).
    pub jobs: Arc<DashMap<Uuid, JobInfo>>,
    pub nodes: Arc<DashMap<String, NodeInfo>>,
    pub queues: HashMap<String, QueueInfo>,
    pub tuning: SchedTuning,
    pub binder: Arc<dyn Binder>,

    namespace_order_fns: Vec<CompareFn<String>>,
    queue_order_fns: Vec<CompareFn<QueueInfo>>,
    job_order_fns: Vec<CompareFn<JobInfo>>,
    task_order_fns: Vec<CompareFn<TaskInfo>>,
    predicate_fns: Vec<PredicateFn>,
    node_order_fns: Vec<NodeOrderFn>,
    batch_node_order_fns: Vec<BatchNodeOrderFn>,
    node_order_reduce_fns: Vec<NodeReduceFn>,
    job_valid_fns: Vec<JobValidFn>,
    job_ready_fns: Vec<JobReadyFn>,
    overused_fns: Vec<OverusedFn>,
}

impl Session {
    pub fn new(snapshot: Snapshot, tuning: SchedTuning, binder: Arc<dyn Binder>) -> Self {
        Session {
            uid: Uuid::new_v4(),
            jobs: Arc::new(snapshot.jobs.into_iter().collect()),
            nodes: Arc::new(snapshot.nodes.into_iter().collect()),
            queues: snapshot.queues,
            tuning,
            binder,
            namespace_order_fns: Vec::new(),
            queue_order_fns: Vec::new(),
            job_order_fns: Vec::new(),
            task_order_fns: Vec::new(),
            predicate_fns: Vec::new(),
            node_order_fns: Vec::new(),
            batch_node_order_fns: Vec::new(),
            node_order_reduce_fns: Vec::new(),
            job_valid_fns: Vec::new(),
            job_ready_fns: Vec::new(),
            overused_fns: Vec::new(),
        }
    }

    /// Names of all nodes in the snapshot, sorted for a stable scan order.
    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    // --- Capability registration (called by plugins at session open) ---

    pub fn add_namespace_order_fn(&mut self, f: CompareFn<String>) {
        self.namespace_order_fns.push(f);
    }
    pub fn add_queue_order_fn(&mut self, f: CompareFn<QueueInfo>) {
        self.queue_order_fns.push(f);
    }
    pub fn add_job_order_fn(&mut self, f: CompareFn<JobInfo>) {
        self.job_order_fns.push(f);
    }
    pub fn add_task_order_fn(&mut self, f: CompareFn<TaskInfo>) {
        self.task_order_fns.push(f);
    }
    pub fn add_predicate_fn(&mut self, f: PredicateFn) {
        self.predicate_fns.push(f);
    }
    pub fn add_node_order_fn(&mut self, f: NodeOrderFn) {
        self.node_order_fns.push(f);
    }
    pub fn add_batch_node_order_fn(&mut self, f: BatchNodeOrderFn) {
        self.batch_node_order_fns.push(f);
    }
    pub fn add_node_order_reduce_fn(&mut self, f: NodeReduceFn) {
        self.node_order_reduce_fns.push(f);
    }
    pub fn add_job_valid_fn(&mut self, f: JobValidFn) {
        self.job_valid_fns.push(f);
    }
    pub fn add_job_ready_fn(&mut self, f: JobReadyFn) {
        self.job_ready_fns.push(f);
    }
    pub fn add_overused_fn(&mut self, f: OverusedFn) {
        self.overused_fns.push(f);
    }

    // --- Capability resolution ---

    /// Fold registered comparators; the first one with an opinion wins.
    fn fold<T>(fns: &[CompareFn<T>], a: &T, b: &T) -> Ordering {
        for f in fns {
            let ord = f(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    pub fn namespace_order(&self, a: &String, b: &String) -> Ordering {
        Self::fold(&self.namespace_order_fns, a, b)
            .then_with(|| a.cmp(b).reverse())
    }

    /// Default: heavier queues first.
    pub fn queue_order(&self, a: &QueueInfo, b: &QueueInfo) -> Ordering {
        Self::fold(&self.queue_order_fns, a, b)
            .then_with(|| a.weight.cmp(&b.weight))
            .then_with(|| a.name.cmp(&b.name).reverse())
    }

    /// Default: older jobs first.
    pub fn job_order(&self, a: &JobInfo, b: &JobInfo) -> Ordering {
        Self::fold(&self.job_order_fns, a, b)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.name.cmp(&b.name).reverse())
    }

    /// Default: higher-priority tasks first.
    pub fn task_order(&self, a: &TaskInfo, b: &TaskInfo) -> Ordering {
        Self::fold(&self.task_order_fns, a, b)
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| a.name.cmp(&b.name).reverse())
    }

    /// Run every registered predicate; all must accept.
    pub fn predicate(&self, task: &TaskInfo, node: &NodeInfo) -> Result<(), FitError> {
        for f in &self.predicate_fns {
            f(task, node)?;
        }
        Ok(())
    }

    /// Summed per-node score across registered scorers.
    pub fn node_order_map(&self, task: &TaskInfo, node: &NodeInfo) -> f64 {
        self.node_order_fns.iter().map(|f| f(task, node)).sum()
    }

    /// Merged batch scores across registered batch scorers.
    pub fn batch_node_order(&self, task: &TaskInfo, nodes: &[NodeInfo]) -> HashMap<String, f64> {
        let mut scores: HashMap<String, f64> = HashMap::new();
        for f in &self.batch_node_order_fns {
            for (name, score) in f(task, nodes) {
                *scores.entry(name).or_insert(0.0) += score;
            }
        }
        scores
    }

    pub fn node_order_reduce(&self, scores: &mut HashMap<String, f64>) {
        for f in &self.node_order_reduce_fns {
            f(scores);
        }
    }

    /// First rejection wins; `None` means the job may be scheduled.
    pub fn job_valid(&self, job: &JobInfo) -> Option<String> {
        self.job_valid_fns.iter().find_map(|f| f(job))
    }

    /// Every registered readiness check must agree; none registered means
    /// ready (a bare session has no gang semantics).
    pub fn job_ready(&self, job: &JobInfo) -> bool {
        self.job_ready_fns.iter().all(|f| f(job))
    }

    /// Any plugin may declare the queue overused.
    pub fn overused(&self, queue: &QueueInfo) -> bool {
        self.overused_fns.iter().any(|f| f(queue))
    }
}
