use serde::{Deserialize, Serialize};

use super::{Metadata, ResourceList};

/// The gang declaration: a named set of pods scheduled together.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodGroup {
    pub metadata: Metadata,
    pub spec: PodGroupSpec,
    pub status: PodGroupStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PodGroupSpec {
    /// Minimal number of members to run the gang at all.
    #[serde(rename = "minMember")]
    pub min_member: u32,
    #[serde(default)]
    pub queue: String,
    #[serde(rename = "priorityClassName", default)]
    pub priority_class_name: String,
    #[serde(rename = "minResources", default)]
    pub min_resources: ResourceList,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PodGroupStatus {
    #[serde(default)]
    pub phase: PodGroupPhase,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum PodGroupPhase {
    /// Not yet admitted by its queue; skipped by the allocate action.
    #[default]
    Pending,
    /// Admitted and eligible for allocation.
    Inqueue,
    Running,
    Unknown,
}

impl PodGroup {
    pub fn new(metadata: Metadata, spec: PodGroupSpec) -> Self {
        PodGroup {
            metadata,
            spec,
            status: PodGroupStatus::default(),
        }
    }
}
