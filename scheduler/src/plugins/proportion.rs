use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::api::{JobInfo, Resource, TaskStatus};
use crate::framework::Session;

use super::Plugin;

/// Statuses whose resources count against a queue's share.
const OCCUPIED: [TaskStatus; 4] = [
    TaskStatus::Allocated,
    TaskStatus::Binding,
    TaskStatus::Bound,
    TaskStatus::Running,
];

/// Weighted fair sharing between queues.
///
/// Each queue deserves `total_allocatable * weight / sum(weights)`; a queue
/// holding more than that is overused and skipped by the allocate action.
/// The consumed share is computed from live session state so it shifts as
/// statements allocate within the cycle.
pub struct ProportionPlugin;

fn queue_allocated(jobs: &DashMap<Uuid, JobInfo>, queue: &str) -> Resource {
    let mut allocated = Resource::default();
    for job in jobs.iter() {
        if job.queue != queue {
            continue;
        }
        for status in OCCUPIED {
            for task in job.tasks_in(status) {
                allocated.add(&task.resreq);
            }
        }
    }
    allocated
}

fn share_ratio(allocated: &Resource, deserved: &Resource) -> f64 {
    let cpu = if deserved.milli_cpu > 0.0 {
        allocated.milli_cpu / deserved.milli_cpu
    } else {
        0.0
    };
    let mem = if deserved.memory > 0.0 {
        allocated.memory / deserved.memory
    } else {
        0.0
    };
    cpu.max(mem)
}

impl Plugin for ProportionPlugin {
    fn name(&self) -> &'static str {
        "proportion"
    }

    fn on_session_open(&self, ssn: &mut Session) {
        let mut total = Resource::default();
        for node in ssn.nodes.iter() {
            total.add(&node.allocatable);
        }

        let weight_sum: u32 = ssn.queues.values().map(|q| q.weight).sum::<u32>().max(1);
        let mut deserved: HashMap<String, Resource> = HashMap::new();
        for queue in ssn.queues.values() {
            let frac = queue.weight as f64 / weight_sum as f64;
            deserved.insert(
                queue.name.clone(),
                Resource::new(total.milli_cpu * frac, total.memory * frac),
            );
        }
        let deserved = Arc::new(deserved);

        {
            let deserved = deserved.clone();
            let jobs = ssn.jobs.clone();
            ssn.add_overused_fn(Box::new(move |queue| {
                let Some(share) = deserved.get(&queue.name) else {
                    return false;
                };
                let allocated = queue_allocated(&jobs, &queue.name);
                let overused = !allocated.less_equal(share);
                if overused {
                    tracing::debug!(queue=%queue.name, "Queue exceeded its deserved share");
                }
                overused
            }));
        }

        {
            let jobs = ssn.jobs.clone();
            ssn.add_queue_order_fn(Box::new(move |a, b| {
                let ra = deserved
                    .get(&a.name)
                    .map(|d| share_ratio(&queue_allocated(&jobs, &a.name), d))
                    .unwrap_or(f64::MAX);
                let rb = deserved
                    .get(&b.name)
                    .map(|d| share_ratio(&queue_allocated(&jobs, &b.name), d))
                    .unwrap_or(f64::MAX);
                // hungrier queue (smaller consumed share) first
                rb.partial_cmp(&ra).unwrap_or(Ordering::Equal)
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{NodeInfo, QueueInfo, TaskInfo};
    use crate::binder::test_binder::FakeBinder;
    use crate::cache::Snapshot;
    use crate::config::SchedTuning;
    use shared::models::{Pod, PodGroup, PodGroupSpec};

    const GI: f64 = 1024.0 * 1024.0 * 1024.0;

    fn job_in_queue(queue: &str, running_req: Resource) -> JobInfo {
        let mut pg = PodGroup::new(
            Default::default(),
            PodGroupSpec {
                min_member: 1,
                queue: queue.to_string(),
                priority_class_name: "".to_string(),
                min_resources: Default::default(),
            },
        );
        pg.metadata.name = format!("job-{}", queue);
        let mut job = JobInfo::new(&pg).unwrap();
        let mut pod = Pod::default();
        pod.spec.node_name = "n1".to_string();
        pod.status.phase = shared::models::PodPhase::Running;
        let mut task = TaskInfo::from_pod(job.uid, &pod).unwrap();
        task.resreq = running_req;
        task.init_resreq = running_req;
        job.add_task(task);
        job
    }

    fn session_with_queues() -> Session {
        let mut queues = HashMap::new();
        queues.insert("q1".to_string(), QueueInfo::synthetic("q1"));
        queues.insert("q2".to_string(), QueueInfo::synthetic("q2"));

        let hungry = job_in_queue("q1", Resource::new(100.0, GI / 8.0));
        let greedy = job_in_queue("q2", Resource::new(3000.0, 6.0 * GI));

        let mut jobs = HashMap::new();
        jobs.insert(hungry.uid, hungry);
        jobs.insert(greedy.uid, greedy);

        let mut nodes = HashMap::new();
        nodes.insert(
            "n1".to_string(),
            NodeInfo::with_capacity("n1", Resource::new(4000.0, 8.0 * GI)),
        );

        Session::new(
            Snapshot {
                jobs,
                nodes,
                queues,
            },
            SchedTuning::default(),
            Arc::new(FakeBinder::default()),
        )
    }

    #[test]
    fn test_queue_over_its_share_is_overused() {
        let mut ssn = session_with_queues();
        ProportionPlugin.on_session_open(&mut ssn);

        // two equal-weight queues deserve half the cluster each
        let q1 = ssn.queues.get("q1").unwrap().clone();
        let q2 = ssn.queues.get("q2").unwrap().clone();
        assert!(!ssn.overused(&q1));
        assert!(ssn.overused(&q2));
    }

    #[test]
    fn test_hungrier_queue_ranks_first() {
        let mut ssn = session_with_queues();
        ProportionPlugin.on_session_open(&mut ssn);

        let q1 = ssn.queues.get("q1").unwrap().clone();
        let q2 = ssn.queues.get("q2").unwrap().clone();
        assert_eq!(ssn.queue_order(&q1, &q2), Ordering::Greater);
    }
}
