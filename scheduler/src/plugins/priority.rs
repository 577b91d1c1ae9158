use crate::framework::Session;

use super::Plugin;

/// Orders jobs and tasks by their declared priority.
pub struct PriorityPlugin;

impl Plugin for PriorityPlugin {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn on_session_open(&self, ssn: &mut Session) {
        ssn.add_job_order_fn(Box::new(|a, b| a.priority.cmp(&b.priority)));
        ssn.add_task_order_fn(Box::new(|a, b| a.priority.cmp(&b.priority)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JobInfo;
    use crate::binder::test_binder::FakeBinder;
    use crate::cache::Snapshot;
    use crate::config::SchedTuning;
    use crate::util::PriorityQueue;
    use shared::models::{PodGroup, PodGroupSpec};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn job(name: &str, priority: i32) -> JobInfo {
        let mut pg = PodGroup::new(
            Default::default(),
            PodGroupSpec {
                min_member: 1,
                queue: "default".to_string(),
                priority_class_name: "".to_string(),
                min_resources: Default::default(),
            },
        );
        pg.metadata.name = name.to_string();
        let mut j = JobInfo::new(&pg).unwrap();
        j.priority = priority;
        j
    }

    #[test]
    fn test_higher_priority_job_pops_first() {
        let mut ssn = Session::new(
            Snapshot {
                jobs: HashMap::new(),
                nodes: HashMap::new(),
                queues: HashMap::new(),
            },
            SchedTuning::default(),
            Arc::new(FakeBinder::default()),
        );
        PriorityPlugin.on_session_open(&mut ssn);

        let mut heap = PriorityQueue::with_cmp(|a: &JobInfo, b: &JobInfo| ssn.job_order(a, b));
        heap.push(job("low", 1));
        heap.push(job("high", 10));
        heap.push(job("mid", 5));

        assert_eq!(heap.pop().unwrap().name, "high");
        assert_eq!(heap.pop().unwrap().name, "mid");
        assert_eq!(heap.pop().unwrap().name, "low");
    }
}
