use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use shared::models::PodGroupPhase;
use uuid::Uuid;

use crate::api::{FitError, FitErrorKind, JobInfo, NodeInfo, QueueInfo, TaskInfo, TaskStatus};
use crate::framework::{Session, Statement};
use crate::util::{predicate_nodes, prioritize_nodes, select_top_nodes, PriorityQueue};

use super::Action;

/// Gang-aware allocation: pick namespace, queue, job and task in order,
/// filter and score nodes, place speculatively through a statement, and
/// commit only when the job's gang criterion holds.
pub struct AllocateAction;

#[async_trait]
impl Action for AllocateAction {
    fn name(&self) -> &'static str {
        "allocate"
    }

    async fn execute(&self, ssn: &Session) {
        tracing::debug!(session=%ssn.uid, "Enter allocate");

        // Bucketise eligible jobs: namespace -> queue -> job heap. Namespaces
        // get the outer loop; they are fewer and more stable than queues, and
        // cycling them keeps consumption balanced across tenants.
        let mut namespaces = PriorityQueue::with_cmp(|a: &String, b: &String| ssn.namespace_order(a, b));
        let mut jobs_map: HashMap<String, HashMap<String, PriorityQueue<'_, JobInfo>>> =
            HashMap::new();

        for entry in ssn.jobs.iter() {
            let job = entry.value();
            if job.phase == PodGroupPhase::Pending {
                continue;
            }
            if let Some(reason) = ssn.job_valid(job) {
                tracing::debug!(job=%job.name, queue=%job.queue, %reason, "Job skips allocate");
                continue;
            }
            if !ssn.queues.contains_key(&job.queue) {
                tracing::warn!(job=%job.name, queue=%job.queue, "Skipping job, queue not found");
                continue;
            }

            let queue_map = jobs_map.entry(job.namespace.clone()).or_insert_with(|| {
                namespaces.push(job.namespace.clone());
                HashMap::new()
            });
            queue_map
                .entry(job.queue.clone())
                .or_insert_with(|| PriorityQueue::with_cmp(|a, b| ssn.job_order(a, b)))
                .push(job.clone());
        }

        tracing::debug!(namespaces = jobs_map.len(), "Try to allocate resource");

        let mut pending_tasks: HashMap<Uuid, PriorityQueue<'_, TaskInfo>> = HashMap::new();
        let all_nodes = ssn.node_names();

        let predicate = |task: &TaskInfo, node: &NodeInfo| -> Result<(), FitError> {
            if !task.init_resreq.less_equal(&node.idle)
                && !task.init_resreq.less_equal(&node.releasing)
            {
                return Err(FitError::new(&node.name, FitErrorKind::NodeResourceFit));
            }
            ssn.predicate(task, node)
        };

        while let Some(namespace) = namespaces.pop() {
            let Some(queue_map) = jobs_map.get_mut(&namespace) else {
                continue;
            };

            // Pick the queue by linear scan: allocations move queue priority
            // across namespaces, and a heap cannot re-rank an arbitrary
            // entry. Queue counts per namespace are small.
            let mut chosen: Option<QueueInfo> = None;
            let mut overused: Vec<String> = Vec::new();
            for queue_name in queue_map.keys() {
                let Some(queue) = ssn.queues.get(queue_name) else {
                    continue;
                };
                if ssn.overused(queue) {
                    tracing::debug!(%namespace, queue=%queue.name, "Queue is overused, ignore it");
                    overused.push(queue_name.clone());
                    continue;
                }
                let better = match &chosen {
                    None => true,
                    Some(best) => ssn.queue_order(queue, best) == Ordering::Greater,
                };
                if better {
                    chosen = Some(queue.clone());
                }
            }
            for name in overused {
                queue_map.remove(&name);
            }
            let Some(queue) = chosen else {
                tracing::debug!(%namespace, "Namespace has no queue, skip it");
                continue;
            };

            let Some(jobs) = queue_map.get_mut(&queue.name) else {
                continue;
            };
            let Some(job) = jobs.pop() else {
                tracing::debug!(queue=%queue.name, "Can not find jobs for queue");
                continue;
            };

            let tasks = pending_tasks.entry(job.uid).or_insert_with(|| {
                let mut heap = PriorityQueue::with_cmp(|a, b| ssn.task_order(a, b));
                if let Some(j) = ssn.jobs.get(&job.uid) {
                    for task in j.tasks_in(TaskStatus::Pending) {
                        // best-effort tasks belong to a later action
                        if task.best_effort() {
                            tracing::debug!(task=%task.name, "BestEffort task, skip it");
                            continue;
                        }
                        heap.push(task.clone());
                    }
                }
                heap
            });

            tracing::debug!(
                tasks = tasks.len(),
                job=%job.name,
                namespace=%job.namespace,
                "Try to allocate resource to tasks"
            );

            let mut stmt = Statement::new(ssn);

            while !tasks.is_empty() {
                let Some(mut task) = tasks.pop() else {
                    break;
                };

                // any task that fails to fit is the last processed in this
                // statement, so surviving deltas describe that task only
                if let Some(mut j) = ssn.jobs.get_mut(&job.uid) {
                    if !j.nodes_fit_delta.is_empty() {
                        j.nodes_fit_delta = HashMap::new();
                    }
                }

                let (feasible, fit_errors) = predicate_nodes(&task, &all_nodes, ssn, predicate);
                if feasible.is_empty() {
                    if let Some(mut j) = ssn.jobs.get_mut(&job.uid) {
                        j.nodes_fit_errors.insert(task.uid, fit_errors);
                    }
                    break;
                }

                // score once, then consume the top K as targets for the next
                // K tasks of this job; scoring is amortised across the gang
                let scores = prioritize_nodes(&task, &feasible, ssn);
                let nodes = select_top_nodes(&scores, feasible, tasks.len() + 1);

                for i in 0..nodes.len() {
                    let node_name = nodes[i].name.clone();
                    // re-read the node; earlier placements in this statement
                    // already changed its idle view
                    let Some(node) = ssn.nodes.get(&node_name).map(|n| n.value().clone()) else {
                        continue;
                    };

                    if task.init_resreq.less_equal(&node.idle) {
                        tracing::debug!(task=%task.name, node=%node_name, "Binding task to node");
                        if let Err(err) = stmt.allocate(task.clone(), &node_name) {
                            tracing::error!(
                                task=%task.uid,
                                node=%node_name,
                                session=%ssn.uid,
                                error=%err,
                                "Failed to allocate task"
                            );
                        }
                    } else {
                        let mut delta = node.idle;
                        delta.fit_delta(&task.init_resreq);
                        if let Some(mut j) = ssn.jobs.get_mut(&job.uid) {
                            j.nodes_fit_delta.insert(node_name.clone(), delta);
                        }
                        tracing::debug!(
                            task=%task.name,
                            node=%node_name,
                            "Task does not fit on node with limited resources"
                        );

                        if task.init_resreq.less_equal(&node.releasing) {
                            tracing::debug!(task=%task.name, node=%node_name, "Pipelining task to node");
                            if let Err(err) = stmt.pipeline(task.clone(), &node_name) {
                                tracing::error!(
                                    task=%task.uid,
                                    node=%node_name,
                                    error=%err,
                                    "Failed to pipeline task"
                                );
                            }
                        }
                    }

                    if tasks.is_empty() {
                        break;
                    }
                    // hand the next task the next selected node; the final
                    // node must not pop a task it has no target for
                    if i < nodes.len() - 1 {
                        match tasks.pop() {
                            Some(next) => task = next,
                            None => break,
                        }
                    }
                }
            }

            let ready = ssn
                .jobs
                .get(&job.uid)
                .map(|j| ssn.job_ready(&j))
                .unwrap_or(false);
            if ready {
                stmt.commit().await;
            } else {
                tracing::debug!(job=%job.name, "Gang not ready, discarding placements");
                stmt.discard();
            }

            // the namespace leaves the loop only once its queues are done
            namespaces.push(namespace);
        }
    }
}
