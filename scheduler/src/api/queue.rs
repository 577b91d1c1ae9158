use shared::models::Queue;
use uuid::Uuid;

/// Scheduling view of one admission queue.
#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub uid: Uuid,
    pub name: String,
    pub weight: u32,
}

impl QueueInfo {
    pub fn new(queue: &Queue) -> Self {
        QueueInfo {
            uid: queue.metadata.uid,
            name: queue.metadata.name.clone(),
            weight: queue.spec.weight.max(1),
        }
    }

    /// Synthetic queue registered when the cluster declares none.
    pub fn synthetic(name: &str) -> Self {
        QueueInfo {
            uid: Uuid::new_v4(),
            name: name.to_string(),
            weight: 1,
        }
    }
}
