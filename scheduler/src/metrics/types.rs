use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::models::ResourceList;

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsMeta {
    pub name: String,
}

/// One node's live usage reading.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeUsageItem {
    pub metadata: MetricsMeta,
    pub timestamp: DateTime<Utc>,
    pub usage: ResourceList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeUsageList {
    pub items: Vec<NodeUsageItem>,
}

/// One node's predicted allocatable reading.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeAllocatableItem {
    pub metadata: MetricsMeta,
    pub timestamp: DateTime<Utc>,
    pub allocatable: ResourceList,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeAllocatableList {
    pub items: Vec<NodeAllocatableItem>,
}

/// Free-form runtime-info reading; the wire format is a bare array of these.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRIMetric {
    pub metadata: MetricsMeta,
    pub timestamp: DateTime<Utc>,
    pub usage: HashMap<String, HashMap<String, f64>>,
}
