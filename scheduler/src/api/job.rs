use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use shared::models::{PodGroup, PodGroupPhase};
use shared::quantity::ParseError;
use uuid::Uuid;

use super::{FitErrors, Resource, ScheduleError, TaskInfo, TaskStatus};

/// Statuses that count towards the gang criterion.
const READY_STATUSES: [TaskStatus; 5] = [
    TaskStatus::Bound,
    TaskStatus::Binding,
    TaskStatus::Running,
    TaskStatus::Allocated,
    TaskStatus::Pipelined,
];

/// Scheduling view of one pod-group and its member tasks.
///
/// Tasks are owned here; other components refer to the job by its uid.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub uid: Uuid,
    pub name: String,
    pub namespace: String,
    pub queue: String,
    pub priority: i32,
    pub min_member: u32,
    pub min_resources: Resource,
    pub phase: PodGroupPhase,
    pub created_at: DateTime<Utc>,

    pub tasks: HashMap<Uuid, TaskInfo>,
    task_status_index: HashMap<TaskStatus, HashSet<Uuid>>,

    /// Per-node shortfall of the last task that failed to fit, for operator
    /// visibility.
    pub nodes_fit_delta: HashMap<String, Resource>,
    /// Per-task rejections accumulated when no node passed the predicates.
    pub nodes_fit_errors: HashMap<Uuid, FitErrors>,
}

impl JobInfo {
    pub fn new(pg: &PodGroup) -> Result<Self, ParseError> {
        Ok(JobInfo {
            uid: pg.metadata.uid,
            name: pg.metadata.name.clone(),
            namespace: pg.metadata.namespace.clone(),
            queue: pg.spec.queue.clone(),
            priority: 0,
            min_member: pg.spec.min_member,
            min_resources: Resource::from_resource_list(&pg.spec.min_resources)?,
            phase: pg.status.phase,
            created_at: pg.metadata.created_at,
            tasks: HashMap::new(),
            task_status_index: HashMap::new(),
            nodes_fit_delta: HashMap::new(),
            nodes_fit_errors: HashMap::new(),
        })
    }

    pub fn add_task(&mut self, task: TaskInfo) {
        self.task_status_index
            .entry(task.status)
            .or_default()
            .insert(task.uid);
        self.tasks.insert(task.uid, task);
    }

    /// Move a task between statuses, keeping the index consistent.
    pub fn update_task_status(
        &mut self,
        uid: &Uuid,
        status: TaskStatus,
    ) -> Result<(), ScheduleError> {
        let task = self
            .tasks
            .get_mut(uid)
            .ok_or(ScheduleError::TaskNotFound(*uid))?;
        if let Some(set) = self.task_status_index.get_mut(&task.status) {
            set.remove(uid);
        }
        task.status = status;
        self.task_status_index.entry(status).or_default().insert(*uid);
        Ok(())
    }

    pub fn set_task_node(&mut self, uid: &Uuid, node: &str) {
        if let Some(task) = self.tasks.get_mut(uid) {
            task.node_name = node.to_string();
        }
    }

    /// Tasks currently in the given status.
    pub fn tasks_in(&self, status: TaskStatus) -> Vec<&TaskInfo> {
        self.task_status_index
            .get(&status)
            .map(|set| set.iter().filter_map(|uid| self.tasks.get(uid)).collect())
            .unwrap_or_default()
    }

    pub fn count_in(&self, status: TaskStatus) -> usize {
        self.task_status_index
            .get(&status)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Tasks occupying (or about to occupy) a node slot.
    pub fn ready_task_num(&self) -> u32 {
        READY_STATUSES
            .iter()
            .map(|s| self.count_in(*s) as u32)
            .sum()
    }

    /// The gang criterion.
    pub fn is_ready(&self) -> bool {
        self.ready_task_num() >= self.min_member
    }

    /// Tasks that could still reach a ready status this cycle or later.
    pub fn valid_task_num(&self) -> u32 {
        self.ready_task_num() + self.count_in(TaskStatus::Pending) as u32
    }
}
