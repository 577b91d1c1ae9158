use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Metadata, ResourceList};

// --- Core ---

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Pod {
    pub metadata: Metadata,
    pub spec: PodSpec,
    pub status: PodStatus,
}

/// Desired state
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodSpec {
    #[serde(rename = "schedulerName", default)]
    pub scheduler_name: String,
    #[serde(rename = "nodeName", default)]
    pub node_name: String,
    #[serde(rename = "priorityClassName", default)]
    pub priority_class_name: String,
    #[serde(default)]
    pub priority: i32,
    pub containers: Vec<ContainerSpec>,
}

/// Actual state
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(rename = "deletionTimestamp", default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

// --- Containers ---

/// Definition of a container within a Pod.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub resources: ResourceRequirements,
}

/// Resource demand of one container, in quantity strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: Option<ResourceList>,
    #[serde(default)]
    pub limits: Option<ResourceList>,
}

// --- Impl ---

impl Pod {
    /// Whether the pod is on its way out and its node slot will be released.
    pub fn is_terminating(&self) -> bool {
        self.status.deletion_timestamp.is_some()
    }
}

impl Default for PodSpec {
    fn default() -> Self {
        PodSpec {
            scheduler_name: "volcano".to_string(),
            node_name: "".to_string(),
            priority_class_name: "".to_string(),
            priority: 0,
            containers: vec![ContainerSpec::default()],
        }
    }
}

impl Default for ContainerSpec {
    fn default() -> Self {
        ContainerSpec {
            name: "test-container".to_string(),
            image: "busybox:latest".to_string(),
            resources: ResourceRequirements::default(),
        }
    }
}

impl Default for Pod {
    fn default() -> Self {
        Pod {
            metadata: Metadata::default(),
            spec: PodSpec::default(),
            status: PodStatus::default(),
        }
    }
}
