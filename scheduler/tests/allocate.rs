//! End-to-end allocation scenarios driven through a real session, with the
//! apiserver mocked for bind RPCs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use g8s_scheduler::actions::allocate::AllocateAction;
use g8s_scheduler::actions::Action;
use g8s_scheduler::api::{JobInfo, NodeInfo, QueueInfo, Resource, TaskInfo, TaskStatus};
use g8s_scheduler::binder::ApiBinder;
use g8s_scheduler::cache::Snapshot;
use g8s_scheduler::config::{ArchimedesOptions, SchedTuning};
use g8s_scheduler::framework::{open_session, Session};
use g8s_scheduler::metrics::ArchimedesMetrics;
use g8s_scheduler::plugins::{new_plugins, Plugin};

const GI: f64 = 1024.0 * 1024.0 * 1024.0;

fn quantity_map(cpu: &str, mem: &str) -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("cpu".to_string(), cpu.to_string());
    m.insert("memory".to_string(), mem.to_string());
    m
}

fn make_node(name: &str, cpu: &str, mem: &str) -> NodeInfo {
    let mut node = shared::models::Node {
        metadata: Default::default(),
        status: Default::default(),
    };
    node.metadata.name = name.to_string();
    node.status.allocatable = quantity_map(cpu, mem);
    NodeInfo::new(&node).unwrap()
}

fn make_job(
    name: &str,
    queue: &str,
    min_member: u32,
    n_tasks: usize,
    cpu: &str,
    mem: &str,
) -> JobInfo {
    let mut pg = shared::models::PodGroup::new(
        Default::default(),
        shared::models::PodGroupSpec {
            min_member,
            queue: queue.to_string(),
            priority_class_name: "".to_string(),
            min_resources: Default::default(),
        },
    );
    pg.metadata.name = name.to_string();
    pg.status.phase = shared::models::PodGroupPhase::Inqueue;
    let mut job = JobInfo::new(&pg).unwrap();

    for i in 0..n_tasks {
        let mut pod = shared::models::Pod::default();
        pod.metadata.name = format!("{}-{}", name, i);
        pod.spec.containers = vec![shared::models::ContainerSpec {
            resources: shared::models::ResourceRequirements {
                requests: Some(quantity_map(cpu, mem)),
                limits: None,
            },
            ..Default::default()
        }];
        job.add_task(TaskInfo::from_pod(job.uid, &pod).unwrap());
    }
    job
}

fn running_task_on(job: &mut JobInfo, node: &str, cpu: &str, mem: &str) {
    let mut pod = shared::models::Pod::default();
    pod.metadata.name = format!("{}-running", job.name);
    pod.spec.node_name = node.to_string();
    pod.status.phase = shared::models::PodPhase::Running;
    pod.spec.containers = vec![shared::models::ContainerSpec {
        resources: shared::models::ResourceRequirements {
            requests: Some(quantity_map(cpu, mem)),
            limits: None,
        },
        ..Default::default()
    }];
    job.add_task(TaskInfo::from_pod(job.uid, &pod).unwrap());
}

fn disabled_metrics() -> Arc<ArchimedesMetrics> {
    ArchimedesMetrics::new(&ArchimedesOptions {
        use_node_metrics: false,
        use_node_allocatable: false,
        url: "".to_string(),
        sync_period: Duration::from_secs(120),
        timeout: Duration::from_secs(5),
        expiration: Duration::from_secs(300),
        mem_usage_ratio: 1.5,
        cpu_usage_ratio: 1.0,
        reserved_memory: "0".to_string(),
        reserved_cpu: 0,
        evaluate_type: "max".to_string(),
        mem_allocatable_ratio: 1.0,
        cpu_allocatable_ratio: 1.0,
        node_metrics_api: "node/metrics".to_string(),
        node_allocate_api: "node/allocatable".to_string(),
        use_runtime_info: false,
        ri_endpoint: "/node/rimetrics".to_string(),
    })
    .unwrap()
}

fn default_plugins() -> Vec<Box<dyn Plugin>> {
    let names: Vec<String> = ["gang", "priority", "proportion", "nodeorder"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    new_plugins(&names, &disabled_metrics())
}

async fn bind_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"^/pods/.*$"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    server
}

fn open(server: &MockServer, jobs: Vec<JobInfo>, nodes: Vec<NodeInfo>, queues: Vec<&str>) -> Session {
    let snapshot = Snapshot {
        jobs: jobs.into_iter().map(|j| (j.uid, j)).collect(),
        nodes: nodes.into_iter().map(|n| (n.name.clone(), n)).collect(),
        queues: queues
            .into_iter()
            .map(|q| (q.to_string(), QueueInfo::synthetic(q)))
            .collect(),
    };
    let binder = Arc::new(ApiBinder::new(&server.uri(), Duration::from_secs(5)));
    open_session(snapshot, SchedTuning::default(), binder, &default_plugins())
}

async fn bind_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

fn job_status_count(ssn: &Session, job: Uuid, status: TaskStatus) -> usize {
    ssn.jobs.get(&job).unwrap().count_in(status)
}

#[tokio::test]
async fn test_single_gang_fits_and_commits() {
    let server = bind_server().await;
    let job = make_job("j1", "default", 2, 2, "1", "2Gi");
    let job_uid = job.uid;
    let ssn = open(
        &server,
        vec![job],
        vec![make_node("n1", "4", "8Gi"), make_node("n2", "4", "8Gi")],
        vec!["default"],
    );

    AllocateAction.execute(&ssn).await;

    // both tasks bound, one per node by the name tie-break
    assert_eq!(bind_count(&server).await, 2);
    assert_eq!(job_status_count(&ssn, job_uid, TaskStatus::Binding), 2);
    for name in ["n1", "n2"] {
        let node = ssn.nodes.get(name).unwrap();
        assert_eq!(node.used, Resource::new(1000.0, 2.0 * GI));
        assert_eq!(node.idle, Resource::new(3000.0, 6.0 * GI));
    }
}

#[tokio::test]
async fn test_underfilled_gang_is_discarded() {
    let server = bind_server().await;
    let job = make_job("j2", "default", 3, 3, "3", "4Gi");
    let job_uid = job.uid;
    let ssn = open(
        &server,
        vec![job],
        vec![make_node("n1", "4", "8Gi"), make_node("n2", "4", "8Gi")],
        vec!["default"],
    );

    AllocateAction.execute(&ssn).await;

    // only two of three tasks could place: everything rolls back
    assert_eq!(bind_count(&server).await, 0);
    assert_eq!(job_status_count(&ssn, job_uid, TaskStatus::Pending), 3);
    for name in ["n1", "n2"] {
        let node = ssn.nodes.get(name).unwrap();
        assert_eq!(node.used, Resource::default());
        assert_eq!(node.idle, node.allocatable);
    }
    // the third task's rejections were recorded before the rollback
    let job = ssn.jobs.get(&job_uid).unwrap();
    assert_eq!(job.nodes_fit_errors.len(), 1);
}

#[tokio::test]
async fn test_task_pipelines_onto_releasing_capacity() {
    let server = bind_server().await;
    let job = make_job("j3", "default", 1, 1, "1500m", "2Gi");
    let job_uid = job.uid;

    let mut node = make_node("n1", "4", "8Gi");
    node.used = Resource::new(3500.0, 7.0 * GI);
    node.idle = Resource::new(500.0, GI);
    node.releasing = Resource::new(2000.0, 4.0 * GI);

    let ssn = open(&server, vec![job], vec![node], vec!["default"]);

    AllocateAction.execute(&ssn).await;

    // no bind RPC for a pipelined task; it waits for the release
    assert_eq!(bind_count(&server).await, 0);
    assert_eq!(job_status_count(&ssn, job_uid, TaskStatus::Pipelined), 1);

    let node = ssn.nodes.get("n1").unwrap();
    assert_eq!(node.releasing, Resource::new(500.0, 2.0 * GI));
    assert_eq!(node.idle, Resource::new(500.0, GI));
    drop(node);

    // the shortfall against idle was recorded for the operator
    let job = ssn.jobs.get(&job_uid).unwrap();
    let delta = job.nodes_fit_delta.get("n1").unwrap();
    assert_eq!(delta.milli_cpu, -1000.0);
    assert_eq!(delta.memory, -1.0 * GI);
}

#[tokio::test]
async fn test_overused_queue_is_skipped() {
    let server = bind_server().await;

    let hungry = make_job("j-q1", "q1", 1, 1, "500m", "1Gi");
    let hungry_uid = hungry.uid;
    let starved = make_job("j-q2", "q2", 1, 1, "500m", "1Gi");
    let starved_uid = starved.uid;
    // q2 already holds well over half the single-node cluster
    let mut greedy = make_job("j-q2-running", "q2", 1, 0, "1", "1Gi");
    running_task_on(&mut greedy, "n1", "3", "6Gi");

    let ssn = open(
        &server,
        vec![hungry, starved, greedy],
        vec![make_node("n1", "4", "8Gi")],
        vec!["q1", "q2"],
    );

    AllocateAction.execute(&ssn).await;

    // only q1's job got resources this cycle
    assert_eq!(bind_count(&server).await, 1);
    assert_eq!(job_status_count(&ssn, hungry_uid, TaskStatus::Binding), 1);
    assert_eq!(job_status_count(&ssn, starved_uid, TaskStatus::Pending), 1);
}

#[tokio::test]
async fn test_best_effort_tasks_are_not_placed() {
    let server = bind_server().await;
    // no requests at all: the gang is "ready" with zero placements and the
    // allocate action must not touch the task
    let mut pg = shared::models::PodGroup::new(
        Default::default(),
        shared::models::PodGroupSpec {
            min_member: 0,
            queue: "default".to_string(),
            priority_class_name: "".to_string(),
            min_resources: Default::default(),
        },
    );
    pg.metadata.name = "best-effort".to_string();
    pg.status.phase = shared::models::PodGroupPhase::Inqueue;
    let mut job = JobInfo::new(&pg).unwrap();
    let pod = shared::models::Pod::default();
    job.add_task(TaskInfo::from_pod(job.uid, &pod).unwrap());
    let job_uid = job.uid;

    let ssn = open(&server, vec![job], vec![make_node("n1", "4", "8Gi")], vec!["default"]);

    AllocateAction.execute(&ssn).await;

    assert_eq!(bind_count(&server).await, 0);
    assert_eq!(job_status_count(&ssn, job_uid, TaskStatus::Pending), 1);
    assert_eq!(ssn.nodes.get("n1").unwrap().used, Resource::default());
}

#[tokio::test]
async fn test_sampling_still_finds_the_minimum_feasible_nodes() {
    let server = bind_server().await;
    let job = make_job("j-sample", "default", 1, 1, "1", "1Gi");
    let task = job.tasks.values().next().unwrap().clone();

    let nodes: Vec<NodeInfo> = (0..10)
        .map(|i| make_node(&format!("node-{:02}", i), "4", "8Gi"))
        .collect();
    let mut ssn = open(&server, vec![job], nodes, vec!["default"]);
    // sample aggressively: 1 percent of 10 nodes, floored at 3
    ssn.tuning = SchedTuning {
        min_nodes_to_find: 3,
        min_percentage_of_nodes_to_find: 1,
        percentage_of_nodes_to_find: 1,
    };

    let names = ssn.node_names();
    let (feasible, errors) =
        g8s_scheduler::util::predicate_nodes(&task, &names, &ssn, |_, _| Ok(()));
    assert_eq!(feasible.len(), 3);
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_pending_phase_jobs_are_not_considered() {
    let server = bind_server().await;
    let mut job = make_job("not-admitted", "default", 1, 1, "1", "1Gi");
    let job_uid = job.uid;
    job.phase = shared::models::PodGroupPhase::Pending;

    let ssn = open(&server, vec![job], vec![make_node("n1", "4", "8Gi")], vec!["default"]);

    AllocateAction.execute(&ssn).await;

    assert_eq!(bind_count(&server).await, 0);
    assert_eq!(job_status_count(&ssn, job_uid, TaskStatus::Pending), 1);
}
