use dashmap::DashMap;

use crate::api::Resource;

use super::types::NodeRIMetric;

/// Key prefix separating predicted-allocatable entries from usage entries
/// in the shared resource map.
const PREDICT_ALLOCATABLE_PREFIX: &str = "predictNodeAllocatable-";

/// Concurrency-safe cache of telemetry readings.
///
/// The scheduling cycle reads while the poller writes; `DashMap` gives the
/// many-readers/one-writer behaviour without a hand-held lock.
#[derive(Default)]
pub struct NodeMetricsCache {
    resources: DashMap<String, Resource>,
    ri_metrics: DashMap<String, NodeRIMetric>,
}

impl NodeMetricsCache {
    pub fn new() -> Self {
        NodeMetricsCache::default()
    }

    pub fn get(&self, name: &str) -> Option<Resource> {
        self.resources.get(name).map(|r| *r)
    }

    pub fn set(&self, name: &str, resource: Resource) {
        self.resources.insert(name.to_string(), resource);
    }

    pub fn delete(&self, name: &str) {
        self.resources.remove(name);
    }

    pub fn get_allocatable(&self, name: &str) -> Option<Resource> {
        self.get(&format!("{}{}", PREDICT_ALLOCATABLE_PREFIX, name))
    }

    pub fn set_allocatable(&self, name: &str, resource: Resource) {
        self.set(&format!("{}{}", PREDICT_ALLOCATABLE_PREFIX, name), resource);
    }

    pub fn delete_allocatable(&self, name: &str) {
        self.delete(&format!("{}{}", PREDICT_ALLOCATABLE_PREFIX, name));
    }

    pub fn get_ri_metric(&self, name: &str) -> Option<NodeRIMetric> {
        self.ri_metrics.get(name).map(|m| m.value().clone())
    }

    pub fn set_ri_metric(&self, name: &str, metric: NodeRIMetric) {
        self.ri_metrics.insert(name.to_string(), metric);
    }

    pub fn delete_ri_metric(&self, name: &str) {
        self.ri_metrics.remove(name);
    }
}
