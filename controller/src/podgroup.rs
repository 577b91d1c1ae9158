use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use shared::api::{
    EventType, PodEvent, PodField, PodGroupEvent, PodPatch, GROUP_NAME_ANNOTATION,
    JDB_MAX_UNAVAILABLE, JDB_MIN_AVAILABLE, POD_PREEMPTABLE, QUEUE_NAME_ANNOTATION,
    REVOCABLE_ZONE,
};
use shared::models::{
    Metadata, OwnerReference, Pod, PodGroup, PodGroupSpec, ResourceList,
};
use shared::quantity::{parse_quantity, ParseError};
use shared::utils::watch_stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::Config;
use crate::state::{PgState, State};

/// Work item queued per observed pod.
#[derive(Debug, Clone)]
pub struct PodRequest {
    pub name: String,
    pub namespace: String,
}

/// Failure while synthesizing a pod-group.
#[derive(Debug)]
pub enum SyncError {
    Api(String),
    BadSpec(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Api(msg) => write!(f, "Apiserver error: {}", msg),
            SyncError::BadSpec(msg) => write!(f, "Bad pod spec: {}", msg),
        }
    }
}

/// Wraps gangless pods into singleton pod-groups and stamps them with the
/// group-name annotation, so the scheduler sees one kind of job only.
pub struct PgController {
    state: State,
    client: Client,
    base_url: String,
    scheduler_name: String,
    default_queue: String,
    tx: mpsc::Sender<PodRequest>,
}

impl PgController {
    fn new(config: &Config) -> (Arc<Self>, mpsc::Receiver<PodRequest>) {
        let (tx, rx) = mpsc::channel::<PodRequest>(100);
        (
            Arc::new(Self {
                state: PgState::new(),
                client: Client::new(),
                base_url: config.master.trim_end_matches('/').to_string(),
                scheduler_name: config.scheduler_name.clone(),
                default_queue: config.default_queue.clone(),
                tx,
            }),
            rx,
        )
    }

    pub async fn run(config: Config) {
        tracing::debug!("Running");
        let (pgc, mut rx) = PgController::new(&config);

        let _ = tokio::try_join!(
            // Watch pods
            {
                let pgc = pgc.clone();
                let uri = format!("{}/pods?watch=true", pgc.base_url);
                tokio::spawn(async move {
                    watch_stream::<PodEvent, _>(&uri, move |event| {
                        pgc.handle_pod_event(event);
                    })
                    .await;
                })
            },
            // Watch podgroups
            {
                let pgc = pgc.clone();
                let uri = format!("{}/podgroups?watch=true", pgc.base_url);
                tokio::spawn(async move {
                    watch_stream::<PodGroupEvent, _>(&uri, move |event| {
                        pgc.handle_podgroup_event(event);
                    })
                    .await;
                })
            },
            // Pull requests and synthesize
            {
                let pgc = pgc.clone();
                tokio::spawn(async move {
                    while let Some(req) = rx.recv().await {
                        pgc.process(req).await;
                    }
                })
            }
        );
    }

    fn handle_pod_event(&self, event: PodEvent) {
        if event.pod.spec.scheduler_name != self.scheduler_name {
            return;
        }
        match event.event_type {
            EventType::Added | EventType::Modified => {
                self.state.add_pod(&event.pod);
                // pods already carrying a gang need no synthesis
                if !event
                    .pod
                    .metadata
                    .annotations
                    .contains_key(GROUP_NAME_ANNOTATION)
                {
                    let _ = self.tx.try_send(PodRequest {
                        name: event.pod.metadata.name.clone(),
                        namespace: event.pod.metadata.namespace.clone(),
                    });
                }
            }
            EventType::Deleted => self
                .state
                .delete_pod(&event.pod.metadata.namespace, &event.pod.metadata.name),
        }
    }

    fn handle_podgroup_event(&self, event: PodGroupEvent) {
        let meta = &event.podgroup.metadata;
        match event.event_type {
            EventType::Added | EventType::Modified => {
                self.state.add_podgroup(&meta.namespace, &meta.name)
            }
            EventType::Deleted => self.state.delete_podgroup(&meta.namespace, &meta.name),
        }
    }

    pub async fn process(&self, req: PodRequest) {
        let Some(pod) = self.state.get_pod(&req.namespace, &req.name) else {
            tracing::warn!(pod=%req.name, namespace=%req.namespace, "Pod not found in state");
            return;
        };

        if let Err(err) = self.create_podgroup_if_missing(&pod).await {
            tracing::error!(pod=%pod.metadata.name, error=%err, "Failed to synthesize pod-group");
        }
    }

    /// Create the singleton pod-group when the lister misses, then stamp the
    /// pod. Re-invocation with matching state changes nothing.
    async fn create_podgroup_if_missing(&self, pod: &Pod) -> Result<(), SyncError> {
        let pg_name = generate_podgroup_name(pod);

        if !self.state.podgroup_exists(&pod.metadata.namespace, &pg_name) {
            let pg = build_podgroup(pod, &pg_name, &self.default_queue)
                .map_err(|e| SyncError::BadSpec(e.to_string()))?;
            self.create_podgroup(&pg).await?;
            self.state
                .add_podgroup(&pod.metadata.namespace, &pg_name);
            tracing::info!(
                podgroup=%pg_name,
                namespace=%pod.metadata.namespace,
                pod=%pod.metadata.name,
                "Created pod-group"
            );
        }

        self.update_pod_annotation(pod, &pg_name).await
    }

    async fn create_podgroup(&self, pg: &PodGroup) -> Result<(), SyncError> {
        let url = format!("{}/podgroups", self.base_url);
        match self.client.post(&url).json(pg).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            // someone else created it first; that is the desired state
            Ok(resp) if resp.status() == reqwest::StatusCode::CONFLICT => Ok(()),
            Ok(resp) => Err(SyncError::Api(format!(
                "create pod-group returned {}",
                resp.status()
            ))),
            Err(err) => Err(SyncError::Api(err.to_string())),
        }
    }

    async fn update_pod_annotation(&self, pod: &Pod, pg_name: &str) -> Result<(), SyncError> {
        match pod.metadata.annotations.get(GROUP_NAME_ANNOTATION) {
            Some(existing) if existing == pg_name => return Ok(()),
            Some(existing) => {
                // existing gang membership wins over anything we derive
                tracing::error!(
                    pod=%pod.metadata.name,
                    namespace=%pod.metadata.namespace,
                    %existing,
                    derived=%pg_name,
                    "Pod already belongs to a different pod-group, leaving annotation untouched"
                );
                return Ok(());
            }
            None => {}
        }

        let url = format!(
            "{}/pods/{}/{}",
            self.base_url, pod.metadata.namespace, pod.metadata.name
        );
        let patch = PodPatch {
            pod_field: PodField::Annotation,
            key: Some(GROUP_NAME_ANNOTATION.to_string()),
            value: pg_name.to_string(),
        };
        match self.client.patch(&url).json(&patch).send().await {
            Ok(resp) if resp.status().is_success() => {
                // keep the local copy consistent until the watch echoes back
                let mut stamped = pod.clone();
                stamped
                    .metadata
                    .annotations
                    .insert(GROUP_NAME_ANNOTATION.to_string(), pg_name.to_string());
                self.state.add_pod(&stamped);
                tracing::info!(pod=%pod.metadata.name, podgroup=%pg_name, "Stamped pod with pod-group");
                Ok(())
            }
            Ok(resp) => Err(SyncError::Api(format!(
                "annotate pod returned {}",
                resp.status()
            ))),
            Err(err) => Err(SyncError::Api(err.to_string())),
        }
    }
}

/// Deterministic name derived from the controlling owner (or the pod
/// itself), so reruns and replicas of one controller converge on the same
/// gang.
pub fn generate_podgroup_name(pod: &Pod) -> String {
    let uid = pod
        .metadata
        .controller_owner()
        .map(|o| o.uid)
        .unwrap_or(pod.metadata.uid);
    format!("podgroup-{}", uid)
}

/// Owner references for the synthesized pod-group: inherit the controlling
/// owner when there is one, otherwise reference the pod itself.
fn pg_owner_references(pod: &Pod) -> Vec<OwnerReference> {
    if pod.metadata.controller_owner().is_some() {
        return pod.metadata.owner_references.clone();
    }
    vec![OwnerReference {
        uid: pod.metadata.uid,
        name: pod.metadata.name.clone(),
        kind: "Pod".to_string(),
        controller: true,
    }]
}

/// Sum one container's demand into the accumulator. Requests win; limits
/// only stand in when the container declares no requests at all.
fn add_resource_list(
    acc: &mut HashMap<String, f64>,
    requests: Option<&ResourceList>,
    limits: Option<&ResourceList>,
) -> Result<(), ParseError> {
    if let Some(requests) = requests {
        for (name, quantity) in requests {
            *acc.entry(name.clone()).or_insert(0.0) += parse_quantity(quantity)?;
        }
        return Ok(());
    }
    if let Some(limits) = limits {
        for (name, quantity) in limits {
            *acc.entry(name.clone()).or_insert(0.0) += parse_quantity(quantity)?;
        }
    }
    Ok(())
}

/// Minimum resources of the singleton gang: the sum over containers.
fn calc_pg_min_resources(pod: &Pod) -> Result<ResourceList, ParseError> {
    let mut acc: HashMap<String, f64> = HashMap::new();
    for container in &pod.spec.containers {
        add_resource_list(
            &mut acc,
            container.resources.requests.as_ref(),
            container.resources.limits.as_ref(),
        )?;
    }

    Ok(acc
        .into_iter()
        .map(|(name, value)| {
            let quantity = if name == "cpu" {
                format!("{}m", (value * 1000.0).round() as i64)
            } else {
                format!("{}", value.round() as i64)
            };
            (name, quantity)
        })
        .collect())
}

fn build_podgroup(pod: &Pod, name: &str, default_queue: &str) -> Result<PodGroup, ParseError> {
    let mut annotations = HashMap::new();
    let mut labels = HashMap::new();
    for key in [POD_PREEMPTABLE, REVOCABLE_ZONE] {
        if let Some(value) = pod.metadata.annotations.get(key) {
            annotations.insert(key.to_string(), value.clone());
        }
    }
    if let Some(value) = pod.metadata.annotations.get(JDB_MIN_AVAILABLE) {
        annotations.insert(JDB_MIN_AVAILABLE.to_string(), value.clone());
    } else if let Some(value) = pod.metadata.annotations.get(JDB_MAX_UNAVAILABLE) {
        annotations.insert(JDB_MAX_UNAVAILABLE.to_string(), value.clone());
    }
    if let Some(value) = pod.metadata.labels.get(POD_PREEMPTABLE) {
        labels.insert(POD_PREEMPTABLE.to_string(), value.clone());
    }

    let queue = pod
        .metadata
        .annotations
        .get(QUEUE_NAME_ANNOTATION)
        .cloned()
        .unwrap_or_else(|| default_queue.to_string());

    let metadata = Metadata {
        uid: Uuid::new_v4(),
        name: name.to_string(),
        namespace: pod.metadata.namespace.clone(),
        annotations,
        labels,
        owner_references: pg_owner_references(pod),
        created_at: Utc::now(),
    };

    Ok(PodGroup::new(
        metadata,
        PodGroupSpec {
            min_member: 1,
            queue,
            priority_class_name: pod.spec.priority_class_name.clone(),
            min_resources: calc_pg_min_resources(pod)?,
        },
    ))
}
