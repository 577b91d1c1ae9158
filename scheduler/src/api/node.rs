use shared::models::Node;
use shared::quantity::ParseError;

use super::{Resource, ScheduleError, TaskInfo, TaskStatus};

/// Scheduling view of one node.
///
/// `idle + used = allocatable` holds under allocate/release; the metrics
/// overlay may push `used` past `allocatable`, in which case `idle` goes
/// negative and fit predicates reject the node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub allocatable: Resource,
    pub used: Resource,
    pub idle: Resource,
    /// Capacity reserved by occupants on their way out; pipelined tasks
    /// consume from here instead of `idle`.
    pub releasing: Resource,
}

impl NodeInfo {
    pub fn new(node: &Node) -> Result<Self, ParseError> {
        let allocatable = Resource::from_resource_list(&node.status.allocatable)?;
        Ok(NodeInfo {
            name: node.metadata.name.clone(),
            allocatable,
            used: Resource::default(),
            idle: allocatable,
            releasing: Resource::default(),
        })
    }

    #[cfg(test)]
    pub fn with_capacity(name: &str, allocatable: Resource) -> Self {
        NodeInfo {
            name: name.to_string(),
            allocatable,
            used: Resource::default(),
            idle: allocatable,
            releasing: Resource::default(),
        }
    }

    /// Fold an existing task of the snapshot into this node's accounting.
    pub fn add_task(&mut self, task: &TaskInfo) {
        let req = &task.resreq;
        match task.status {
            TaskStatus::Releasing => {
                self.releasing.add(req);
                self.idle.sub(req);
                self.used.add(req);
            }
            TaskStatus::Pipelined => {
                self.releasing.sub(req);
            }
            TaskStatus::Allocated
            | TaskStatus::Binding
            | TaskStatus::Bound
            | TaskStatus::Running => {
                self.idle.sub(req);
                self.used.add(req);
            }
            _ => {}
        }
    }

    /// Claim idle capacity for a task being allocated in this cycle.
    pub fn allocate(&mut self, req: &Resource) -> Result<(), ScheduleError> {
        if !req.less_equal(&self.idle) {
            return Err(ScheduleError::ResourceShortage(format!(
                "node {} idle ({}) cannot cover request ({})",
                self.name, self.idle, req
            )));
        }
        self.idle.sub(req);
        self.used.add(req);
        Ok(())
    }

    /// Inverse of `allocate`, used on statement discard.
    pub fn release_allocated(&mut self, req: &Resource) {
        self.idle.add(req);
        self.used.sub(req);
    }

    /// Claim releasing capacity for a pipelined task.
    pub fn pipeline(&mut self, req: &Resource) {
        self.releasing.sub(req);
    }

    /// Inverse of `pipeline`, used on statement discard.
    pub fn unpipeline(&mut self, req: &Resource) {
        self.releasing.add(req);
    }

    /// Overlay hook: replace `used` and rederive `idle`.
    pub fn set_used(&mut self, used: Resource) {
        self.used = used;
        self.idle = self.allocatable;
        self.idle.sub(&used);
    }
}
