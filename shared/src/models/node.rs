use serde::{Deserialize, Serialize};

use super::{Metadata, ResourceList};

/// Represents a node in the cluster.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Node {
    pub metadata: Metadata,
    pub status: NodeStatus,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NodeStatus {
    /// Upper bound of what the node can host.
    #[serde(default)]
    pub allocatable: ResourceList,
}
