use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use shared::api::{
    EventType, NodeEvent, PodEvent, PodGroupEvent, QueueEvent, GROUP_NAME_ANNOTATION,
};
use shared::models::{Node, Pod, PodGroup, PodPhase, Queue};
use shared::utils::watch_stream;
use uuid::Uuid;

use crate::api::{JobInfo, NodeInfo, QueueInfo, TaskInfo};

/// Inputs for one session, extracted from the cache at cycle start.
pub struct Snapshot {
    pub jobs: HashMap<Uuid, JobInfo>,
    pub nodes: HashMap<String, NodeInfo>,
    pub queues: HashMap<String, QueueInfo>,
}

/// Live cluster state fed by apiserver watch streams.
///
/// The cache itself is eventually consistent; each scheduling cycle works
/// on the `Snapshot` it extracts, never on the cache directly.
pub struct ClusterCache {
    pub pods: DashMap<Uuid, Pod>,
    /// Keyed `namespace/name`, matching the pod annotation join.
    pub podgroups: DashMap<String, PodGroup>,
    pub queues: DashMap<String, Queue>,
    pub nodes: DashMap<String, Node>,

    scheduler_name: String,
    default_queue: String,
}

fn group_key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl ClusterCache {
    pub fn new(scheduler_name: &str, default_queue: &str) -> Arc<Self> {
        Arc::new(ClusterCache {
            pods: DashMap::new(),
            podgroups: DashMap::new(),
            queues: DashMap::new(),
            nodes: DashMap::new(),
            scheduler_name: scheduler_name.to_string(),
            default_queue: default_queue.to_string(),
        })
    }

    /// Spawn the watch streams feeding this cache.
    pub fn run(cache: Arc<Self>, master: &str) {
        let master = master.trim_end_matches('/').to_string();
        {
            let cache = cache.clone();
            let uri = format!("{}/pods?watch=true", master);
            tokio::spawn(async move {
                watch_stream::<PodEvent, _>(&uri, move |event| cache.handle_pod_event(event)).await;
            });
        }
        {
            let cache = cache.clone();
            let uri = format!("{}/podgroups?watch=true", master);
            tokio::spawn(async move {
                watch_stream::<PodGroupEvent, _>(&uri, move |event| {
                    cache.handle_podgroup_event(event)
                })
                .await;
            });
        }
        {
            let cache = cache.clone();
            let uri = format!("{}/queues?watch=true", master);
            tokio::spawn(async move {
                watch_stream::<QueueEvent, _>(&uri, move |event| cache.handle_queue_event(event))
                    .await;
            });
        }
        {
            let cache = cache.clone();
            let uri = format!("{}/nodes?watch=true", master);
            tokio::spawn(async move {
                watch_stream::<NodeEvent, _>(&uri, move |event| cache.handle_node_event(event))
                    .await;
            });
        }
    }

    pub fn handle_pod_event(&self, event: PodEvent) {
        if event.pod.spec.scheduler_name != self.scheduler_name {
            return;
        }
        match event.event_type {
            EventType::Added | EventType::Modified => {
                self.pods.insert(event.pod.metadata.uid, event.pod);
            }
            EventType::Deleted => {
                self.pods.remove(&event.pod.metadata.uid);
            }
        }
    }

    pub fn handle_podgroup_event(&self, event: PodGroupEvent) {
        let key = group_key(&event.podgroup.metadata.namespace, &event.podgroup.metadata.name);
        match event.event_type {
            EventType::Added | EventType::Modified => {
                self.podgroups.insert(key, event.podgroup);
            }
            EventType::Deleted => {
                self.podgroups.remove(&key);
            }
        }
    }

    pub fn handle_queue_event(&self, event: QueueEvent) {
        match event.event_type {
            EventType::Added | EventType::Modified => {
                self.queues
                    .insert(event.queue.metadata.name.clone(), event.queue);
            }
            EventType::Deleted => {
                self.queues.remove(&event.queue.metadata.name);
            }
        }
    }

    pub fn handle_node_event(&self, event: NodeEvent) {
        match event.event_type {
            EventType::Added | EventType::Modified => {
                self.nodes
                    .insert(event.node.metadata.name.clone(), event.node);
            }
            EventType::Deleted => {
                self.nodes.remove(&event.node.metadata.name);
            }
        }
    }

    /// Extract the scheduling view for one cycle.
    pub fn snapshot(&self) -> Snapshot {
        let mut nodes: HashMap<String, NodeInfo> = HashMap::new();
        for entry in self.nodes.iter() {
            match NodeInfo::new(entry.value()) {
                Ok(info) => {
                    nodes.insert(info.name.clone(), info);
                }
                Err(err) => {
                    tracing::warn!(node=%entry.key(), error=%err, "Skipping node with bad allocatable");
                }
            }
        }

        let mut queues: HashMap<String, QueueInfo> = HashMap::new();
        for entry in self.queues.iter() {
            queues.insert(entry.key().clone(), QueueInfo::new(entry.value()));
        }
        queues
            .entry(self.default_queue.clone())
            .or_insert_with(|| QueueInfo::synthetic(&self.default_queue));

        let mut jobs: HashMap<Uuid, JobInfo> = HashMap::new();
        let mut uid_by_key: HashMap<String, Uuid> = HashMap::new();
        for entry in self.podgroups.iter() {
            match JobInfo::new(entry.value()) {
                Ok(mut job) => {
                    if job.queue.is_empty() {
                        job.queue = self.default_queue.clone();
                    }
                    uid_by_key.insert(entry.key().clone(), job.uid);
                    jobs.insert(job.uid, job);
                }
                Err(err) => {
                    tracing::warn!(podgroup=%entry.key(), error=%err, "Skipping pod-group with bad min resources");
                }
            }
        }

        for entry in self.pods.iter() {
            let pod = entry.value();
            // finished pods hold no resources anymore
            if matches!(pod.status.phase, PodPhase::Succeeded | PodPhase::Failed) {
                continue;
            }
            let Some(group_name) = pod.metadata.annotations.get(GROUP_NAME_ANNOTATION) else {
                // the pod-group controller has not stamped this pod yet
                continue;
            };
            let key = group_key(&pod.metadata.namespace, group_name);
            let Some(job_uid) = uid_by_key.get(&key) else {
                tracing::warn!(pod=%pod.metadata.name, podgroup=%key, "Pod references unknown pod-group");
                continue;
            };

            let task = match TaskInfo::from_pod(*job_uid, pod) {
                Ok(task) => task,
                Err(err) => {
                    tracing::warn!(pod=%pod.metadata.name, error=%err, "Skipping pod with bad requests");
                    continue;
                }
            };

            if !task.node_name.is_empty() {
                if let Some(node) = nodes.get_mut(&task.node_name) {
                    node.add_task(&task);
                }
            }
            if let Some(job) = jobs.get_mut(job_uid) {
                job.priority = job.priority.max(task.priority);
                job.add_task(task);
            }
        }

        Snapshot {
            jobs,
            nodes,
            queues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Resource, TaskStatus};
    use chrono::Utc;
    use shared::models::{ContainerSpec, PodGroupPhase, PodGroupSpec, ResourceRequirements};

    const GI: f64 = 1024.0 * 1024.0 * 1024.0;

    fn quantity_map(cpu: &str, mem: &str) -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("cpu".to_string(), cpu.to_string());
        m.insert("memory".to_string(), mem.to_string());
        m
    }

    fn test_node(name: &str) -> Node {
        let mut node = Node {
            metadata: Default::default(),
            status: Default::default(),
        };
        node.metadata.name = name.to_string();
        node.status.allocatable = quantity_map("4", "8Gi");
        node
    }

    fn test_podgroup(name: &str, min_member: u32) -> PodGroup {
        let mut pg = PodGroup::new(
            Default::default(),
            PodGroupSpec {
                min_member,
                queue: "default".to_string(),
                priority_class_name: "".to_string(),
                min_resources: Default::default(),
            },
        );
        pg.metadata.name = name.to_string();
        pg.status.phase = PodGroupPhase::Inqueue;
        pg
    }

    fn member_pod(group: &str, cpu: &str, mem: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata
            .annotations
            .insert(GROUP_NAME_ANNOTATION.to_string(), group.to_string());
        pod.spec.containers = vec![ContainerSpec {
            resources: ResourceRequirements {
                requests: Some(quantity_map(cpu, mem)),
                limits: None,
            },
            ..Default::default()
        }];
        pod
    }

    fn added<T>(x: T) -> (EventType, T) {
        (EventType::Added, x)
    }

    #[test]
    fn test_snapshot_joins_pods_to_jobs() {
        let cache = ClusterCache::new("volcano", "default");
        let (et, node) = added(test_node("n1"));
        cache.handle_node_event(NodeEvent {
            event_type: et,
            node,
        });
        let (et, pg) = added(test_podgroup("pg1", 2));
        cache.handle_podgroup_event(PodGroupEvent {
            event_type: et,
            podgroup: pg,
        });
        for _ in 0..2 {
            cache.handle_pod_event(PodEvent {
                event_type: EventType::Added,
                pod: member_pod("pg1", "1", "2Gi"),
            });
        }

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.jobs.len(), 1);
        let job = snapshot.jobs.values().next().unwrap();
        assert_eq!(job.tasks.len(), 2);
        assert_eq!(job.count_in(TaskStatus::Pending), 2);
        assert!(snapshot.queues.contains_key("default"));
    }

    #[test]
    fn test_bound_pod_counts_into_node_used() {
        let cache = ClusterCache::new("volcano", "default");
        cache.handle_node_event(NodeEvent {
            event_type: EventType::Added,
            node: test_node("n1"),
        });
        cache.handle_podgroup_event(PodGroupEvent {
            event_type: EventType::Added,
            podgroup: test_podgroup("pg1", 1),
        });
        let mut pod = member_pod("pg1", "1", "2Gi");
        pod.spec.node_name = "n1".to_string();
        pod.status.phase = PodPhase::Running;
        cache.handle_pod_event(PodEvent {
            event_type: EventType::Added,
            pod,
        });

        let snapshot = cache.snapshot();
        let node = snapshot.nodes.get("n1").unwrap();
        assert_eq!(node.used, Resource::new(1000.0, 2.0 * GI));
        assert_eq!(node.idle, Resource::new(3000.0, 6.0 * GI));
    }

    #[test]
    fn test_terminating_pod_feeds_releasing() {
        let cache = ClusterCache::new("volcano", "default");
        cache.handle_node_event(NodeEvent {
            event_type: EventType::Added,
            node: test_node("n1"),
        });
        cache.handle_podgroup_event(PodGroupEvent {
            event_type: EventType::Added,
            podgroup: test_podgroup("pg1", 1),
        });
        let mut pod = member_pod("pg1", "2", "4Gi");
        pod.spec.node_name = "n1".to_string();
        pod.status.phase = PodPhase::Running;
        pod.status.deletion_timestamp = Some(Utc::now());
        cache.handle_pod_event(PodEvent {
            event_type: EventType::Added,
            pod,
        });

        let snapshot = cache.snapshot();
        let node = snapshot.nodes.get("n1").unwrap();
        assert_eq!(node.releasing, Resource::new(2000.0, 4.0 * GI));
        assert_eq!(node.used, Resource::new(2000.0, 4.0 * GI));
    }

    #[test]
    fn test_foreign_scheduler_pods_are_ignored() {
        let cache = ClusterCache::new("volcano", "default");
        let mut pod = member_pod("pg1", "1", "1Gi");
        pod.spec.scheduler_name = "default-scheduler".to_string();
        cache.handle_pod_event(PodEvent {
            event_type: EventType::Added,
            pod,
        });
        assert!(cache.pods.is_empty());
    }
}
