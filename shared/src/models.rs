pub mod metadata;
pub mod node;
pub mod pod;
pub mod podgroup;
pub mod queue;

pub use metadata::{Metadata, OwnerReference};
pub use node::{Node, NodeStatus};
pub use pod::{ContainerSpec, Pod, PodPhase, PodSpec, PodStatus, ResourceRequirements};
pub use podgroup::{PodGroup, PodGroupPhase, PodGroupSpec, PodGroupStatus};
pub use queue::{Queue, QueueSpec};

use std::collections::HashMap;

/// Kubernetes-style resource map: `"cpu" -> "2500m"`, `"memory" -> "2Gi"`.
pub type ResourceList = HashMap<String, String>;
