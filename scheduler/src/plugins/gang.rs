use std::cmp::Ordering;

use crate::framework::Session;

use super::Plugin;

/// All-or-nothing semantics: a job is only committed once enough of its
/// tasks hold (or are about to hold) a node slot.
pub struct GangPlugin;

impl Plugin for GangPlugin {
    fn name(&self) -> &'static str {
        "gang"
    }

    fn on_session_open(&self, ssn: &mut Session) {
        // a job whose pending + occupied population cannot reach the gang
        // size can never commit this cycle, so skip it up front
        ssn.add_job_valid_fn(Box::new(|job| {
            if job.valid_task_num() >= job.min_member {
                None
            } else {
                Some(format!(
                    "job {}/{} has {} schedulable tasks but needs {}",
                    job.namespace,
                    job.name,
                    job.valid_task_num(),
                    job.min_member
                ))
            }
        }));

        ssn.add_job_ready_fn(Box::new(|job| job.is_ready()));

        // starving gangs go first; satisfied ones can wait
        ssn.add_job_order_fn(Box::new(|a, b| match (a.is_ready(), b.is_ready()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{JobInfo, TaskInfo};
    use crate::binder::test_binder::FakeBinder;
    use crate::cache::Snapshot;
    use crate::config::SchedTuning;
    use shared::models::{Pod, PodGroup, PodGroupPhase, PodGroupSpec};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn empty_session() -> Session {
        Session::new(
            Snapshot {
                jobs: HashMap::new(),
                nodes: HashMap::new(),
                queues: HashMap::new(),
            },
            SchedTuning::default(),
            Arc::new(FakeBinder::default()),
        )
    }

    fn job(min_member: u32, pending: usize) -> JobInfo {
        let mut pg = PodGroup::new(
            Default::default(),
            PodGroupSpec {
                min_member,
                queue: "default".to_string(),
                priority_class_name: "".to_string(),
                min_resources: Default::default(),
            },
        );
        pg.status.phase = PodGroupPhase::Inqueue;
        let mut job = JobInfo::new(&pg).unwrap();
        for _ in 0..pending {
            job.add_task(TaskInfo::from_pod(job.uid, &Pod::default()).unwrap());
        }
        job
    }

    #[test]
    fn test_undersized_job_is_invalid() {
        let mut ssn = empty_session();
        GangPlugin.on_session_open(&mut ssn);

        assert!(ssn.job_valid(&job(3, 2)).is_some());
        assert!(ssn.job_valid(&job(3, 3)).is_none());
    }

    #[test]
    fn test_ready_follows_gang_criterion() {
        let mut ssn = empty_session();
        GangPlugin.on_session_open(&mut ssn);

        let mut j = job(2, 2);
        assert!(!ssn.job_ready(&j));

        let uids: Vec<_> = j.tasks.keys().copied().collect();
        j.update_task_status(&uids[0], crate::api::TaskStatus::Allocated)
            .unwrap();
        j.update_task_status(&uids[1], crate::api::TaskStatus::Allocated)
            .unwrap();
        assert!(ssn.job_ready(&j));
    }
}
