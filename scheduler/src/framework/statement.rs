use crate::api::{Resource, ScheduleError, TaskInfo, TaskStatus};

use super::Session;

/// One buffered placement intent.
#[derive(Debug, Clone)]
enum Operation {
    Allocate {
        task: TaskInfo,
        node: String,
        req: Resource,
    },
    Pipeline {
        task: TaskInfo,
        node: String,
        req: Resource,
    },
}

/// Transactional buffer of placement intents scoped to one job within one
/// session.
///
/// Mutations land on the session snapshot eagerly so later operations in
/// the same statement observe updated `idle`/`releasing`; only `commit`
/// externalises them, and `discard` walks the log backwards to restore the
/// snapshot exactly.
pub struct Statement<'a> {
    ssn: &'a Session,
    operations: Vec<Operation>,
}

impl<'a> Statement<'a> {
    pub fn new(ssn: &'a Session) -> Self {
        Statement {
            ssn,
            operations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Speculatively place a task on a node's idle capacity.
    pub fn allocate(&mut self, task: TaskInfo, node_name: &str) -> Result<(), ScheduleError> {
        let req = task.init_resreq;
        {
            let mut node = self
                .ssn
                .nodes
                .get_mut(node_name)
                .ok_or_else(|| ScheduleError::NodeNotFound(node_name.to_string()))?;
            node.allocate(&req)?;
        }

        {
            let mut job = self
                .ssn
                .jobs
                .get_mut(&task.job)
                .ok_or(ScheduleError::JobNotFound(task.job))?;
            job.update_task_status(&task.uid, TaskStatus::Allocated)?;
            job.set_task_node(&task.uid, node_name);
        }

        tracing::debug!(task=%task.name, node=%node_name, "Allocated");
        self.operations.push(Operation::Allocate {
            task,
            node: node_name.to_string(),
            req,
        });
        Ok(())
    }

    /// Speculatively place a task against capacity a leaving occupant will
    /// free up.
    pub fn pipeline(&mut self, task: TaskInfo, node_name: &str) -> Result<(), ScheduleError> {
        let req = task.init_resreq;
        {
            let mut node = self
                .ssn
                .nodes
                .get_mut(node_name)
                .ok_or_else(|| ScheduleError::NodeNotFound(node_name.to_string()))?;
            node.pipeline(&req);
        }

        {
            let mut job = self
                .ssn
                .jobs
                .get_mut(&task.job)
                .ok_or(ScheduleError::JobNotFound(task.job))?;
            job.update_task_status(&task.uid, TaskStatus::Pipelined)?;
            job.set_task_node(&task.uid, node_name);
        }

        tracing::debug!(task=%task.name, node=%node_name, "Pipelined");
        self.operations.push(Operation::Pipeline {
            task,
            node: node_name.to_string(),
            req,
        });
        Ok(())
    }

    /// Externalise every buffered intent. Bind failures are logged per task
    /// and do not roll back the rest of the commit; the pod stays pending
    /// and is retried by a later cycle.
    pub async fn commit(self) {
        for op in &self.operations {
            match op {
                Operation::Allocate { task, node, .. } => {
                    if let Some(mut job) = self.ssn.jobs.get_mut(&task.job) {
                        let _ = job.update_task_status(&task.uid, TaskStatus::Binding);
                    }
                    if let Err(err) = self.ssn.binder.bind(task, node).await {
                        tracing::error!(task=%task.name, %node, error=%err, "Failed to bind task");
                    }
                }
                Operation::Pipeline { task, node, .. } => {
                    // nothing to externalise; the task waits for the release
                    tracing::debug!(task=%task.name, %node, "Pipelined placement committed");
                }
            }
        }
    }

    /// Roll back every buffered intent in reverse order.
    pub fn discard(self) {
        for op in self.operations.iter().rev() {
            match op {
                Operation::Allocate { task, node, req } => {
                    if let Some(mut n) = self.ssn.nodes.get_mut(node) {
                        n.release_allocated(req);
                    }
                    if let Some(mut job) = self.ssn.jobs.get_mut(&task.job) {
                        let _ = job.update_task_status(&task.uid, TaskStatus::Pending);
                        job.set_task_node(&task.uid, "");
                    }
                }
                Operation::Pipeline { task, node, req } => {
                    if let Some(mut n) = self.ssn.nodes.get_mut(node) {
                        n.unpipeline(req);
                    }
                    if let Some(mut job) = self.ssn.jobs.get_mut(&task.job) {
                        let _ = job.update_task_status(&task.uid, TaskStatus::Pending);
                        job.set_task_node(&task.uid, "");
                    }
                }
            }
        }
    }
}
