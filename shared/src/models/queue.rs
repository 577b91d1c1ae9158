use serde::{Deserialize, Serialize};

use super::Metadata;

/// Admission bucket jobs are submitted into.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Queue {
    pub metadata: Metadata,
    pub spec: QueueSpec,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSpec {
    /// Relative share of the cluster this queue deserves.
    pub weight: u32,
}

impl Default for QueueSpec {
    fn default() -> Self {
        QueueSpec { weight: 1 }
    }
}
