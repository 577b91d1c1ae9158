use serde::{Deserialize, Serialize};

use crate::models::{Node, Pod, PodGroup, Queue};

// ============================= ANNOTATIONS

/// Gang membership, stamped by the pod-group controller.
pub const GROUP_NAME_ANNOTATION: &str = "scheduling.volcano.sh/group-name";
/// Queue the synthesized pod-group is admitted into.
pub const QUEUE_NAME_ANNOTATION: &str = "scheduling.volcano.sh/queue-name";
pub const POD_PREEMPTABLE: &str = "volcano.sh/preemptable";
pub const REVOCABLE_ZONE: &str = "volcano.sh/revocable-zone";
pub const JDB_MIN_AVAILABLE: &str = "volcano.sh/jdb-min-available";
pub const JDB_MAX_UNAVAILABLE: &str = "volcano.sh/jdb-max-unavailable";

// ============================= EVENTS

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PodEvent {
    pub event_type: EventType,
    pub pod: Pod,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PodGroupEvent {
    pub event_type: EventType,
    pub podgroup: PodGroup,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEvent {
    pub event_type: EventType,
    pub queue: Queue,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeEvent {
    pub event_type: EventType,
    pub node: Node,
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum EventType {
    Added,
    Deleted,
    Modified,
}

// ============================= POD PATCH

/// Partial update issued against the apiserver.
#[derive(Deserialize, Serialize, Debug)]
pub struct PodPatch {
    pub pod_field: PodField,
    /// Annotation key for `PodField::Annotation` patches.
    #[serde(default)]
    pub key: Option<String>,
    pub value: String,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
pub enum PodField {
    #[serde(rename = "node_name")]
    NodeName,
    #[serde(rename = "annotation")]
    Annotation,
}
