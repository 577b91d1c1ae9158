use shared::models::{Pod, PodPhase};
use shared::quantity::ParseError;
use uuid::Uuid;

use super::Resource;

/// Lifecycle of a task inside one scheduling view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Waiting for a node.
    Pending,
    /// Speculatively placed by the current cycle.
    Allocated,
    /// Placed against releasing capacity, waiting for the occupant to leave.
    Pipelined,
    /// Bind RPC in flight.
    Binding,
    Bound,
    Running,
    /// Occupant on its way out; its slot feeds `node.releasing`.
    Releasing,
    Succeeded,
    Failed,
    Unknown,
}

/// A single schedulable unit inside a job.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub uid: Uuid,
    pub name: String,
    pub namespace: String,
    /// Owning job, referenced by handle to avoid a back-pointer.
    pub job: Uuid,
    pub node_name: String,
    pub status: TaskStatus,
    pub priority: i32,
    pub resreq: Resource,
    /// Demand used for placement decisions; fixed at snapshot time.
    pub init_resreq: Resource,
}

impl TaskInfo {
    /// Build the scheduling view of a pod that belongs to job `job`.
    pub fn from_pod(job: Uuid, pod: &Pod) -> Result<Self, ParseError> {
        let mut resreq = Resource::default();
        for container in &pod.spec.containers {
            if let Some(requests) = &container.resources.requests {
                resreq.add(&Resource::from_resource_list(requests)?);
            }
        }

        Ok(TaskInfo {
            uid: pod.metadata.uid,
            name: pod.metadata.name.clone(),
            namespace: pod.metadata.namespace.clone(),
            job,
            node_name: pod.spec.node_name.clone(),
            status: task_status(pod),
            priority: pod.spec.priority,
            resreq,
            init_resreq: resreq,
        })
    }

    /// Best-effort tasks carry no meaningful request and are deferred to a
    /// later action.
    pub fn best_effort(&self) -> bool {
        self.resreq.is_empty()
    }
}

fn task_status(pod: &Pod) -> TaskStatus {
    if pod.is_terminating() {
        return TaskStatus::Releasing;
    }
    match pod.status.phase {
        PodPhase::Pending if pod.spec.node_name.is_empty() => TaskStatus::Pending,
        PodPhase::Pending => TaskStatus::Bound,
        PodPhase::Running => TaskStatus::Running,
        PodPhase::Succeeded => TaskStatus::Succeeded,
        PodPhase::Failed => TaskStatus::Failed,
        PodPhase::Unknown => TaskStatus::Unknown,
    }
}
