use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::api::Resource;
use crate::config::ArchimedesOptions;

use super::cache::NodeMetricsCache;
use super::types::{NodeAllocatableList, NodeRIMetric, NodeUsageList};
use super::MetricsError;

/// HTTP client for the telemetry service, backed by the expiring cache.
pub struct MetricsClient {
    client: Client,
    url: String,
    node_metrics_api: String,
    node_allocate_api: String,
    ri_endpoint: String,
    expiration: chrono::Duration,
    cache: NodeMetricsCache,
}

impl MetricsClient {
    pub fn new(opts: &ArchimedesOptions) -> Self {
        // the configured timeout is a plain duration, taken at face value
        let client = Client::builder()
            .timeout(opts.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        MetricsClient {
            client,
            url: opts.url.trim_end_matches('/').to_string(),
            node_metrics_api: opts.node_metrics_api.clone(),
            node_allocate_api: opts.node_allocate_api.clone(),
            ri_endpoint: opts.ri_endpoint.clone(),
            expiration: chrono::Duration::from_std(opts.expiration)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
            cache: NodeMetricsCache::new(),
        }
    }

    /// Fetch live usage for every node, refreshing the cache. Stale records
    /// are evicted instead of stored. Returns the batch timestamp.
    pub async fn get_all_node_metrics(&self) -> Result<DateTime<Utc>, MetricsError> {
        let raw = self.http_get(&self.node_metrics_api).await?;
        let list: NodeUsageList = serde_json::from_str(&raw)
            .map_err(|e| MetricsError::UpstreamMalformed(e.to_string()))?;
        if list.items.is_empty() {
            return Err(MetricsError::NoMetrics);
        }

        let now = Utc::now();
        for item in &list.items {
            if now.signed_duration_since(item.timestamp) > self.expiration {
                self.cache.delete(&item.metadata.name);
                tracing::debug!(node=%item.metadata.name, "Evicted stale usage reading");
                continue;
            }
            let usage = Resource::from_resource_list(&item.usage)
                .map_err(|e| MetricsError::UpstreamMalformed(e.to_string()))?;
            self.cache.set(&item.metadata.name, usage);
        }

        Ok(list.items[0].timestamp)
    }

    pub fn get_node_metrics(&self, name: &str) -> Option<Resource> {
        self.cache.get(name)
    }

    /// Fetch predicted allocatable for every node; same expiry policy, kept
    /// under a prefixed key so usage readings are not shadowed.
    pub async fn get_all_node_allocatable(&self) -> Result<DateTime<Utc>, MetricsError> {
        let raw = self.http_get(&self.node_allocate_api).await?;
        let list: NodeAllocatableList = serde_json::from_str(&raw)
            .map_err(|e| MetricsError::UpstreamMalformed(e.to_string()))?;
        if list.items.is_empty() {
            return Err(MetricsError::NoMetrics);
        }

        let now = Utc::now();
        for item in &list.items {
            if now.signed_duration_since(item.timestamp) > self.expiration {
                self.cache.delete_allocatable(&item.metadata.name);
                continue;
            }
            let allocatable = Resource::from_resource_list(&item.allocatable)
                .map_err(|e| MetricsError::UpstreamMalformed(e.to_string()))?;
            self.cache.set_allocatable(&item.metadata.name, allocatable);
        }

        Ok(list.items[0].timestamp)
    }

    pub fn get_node_allocatable(&self, name: &str) -> Option<Resource> {
        self.cache.get_allocatable(name)
    }

    /// Fetch runtime-info readings for every node.
    pub async fn get_all_node_ri_metrics(&self) -> Result<(), MetricsError> {
        let raw = self.http_get(&self.ri_endpoint).await?;
        let list: Vec<NodeRIMetric> = serde_json::from_str(&raw)
            .map_err(|e| MetricsError::UpstreamMalformed(e.to_string()))?;
        if list.is_empty() {
            return Err(MetricsError::NoMetrics);
        }

        for item in list {
            let name = item.metadata.name.clone();
            self.cache.set_ri_metric(&name, item);
        }
        Ok(())
    }

    pub fn get_node_ri_metrics(&self, name: &str) -> Option<NodeRIMetric> {
        self.cache.get_ri_metric(name)
    }

    async fn http_get(&self, api: &str) -> Result<String, MetricsError> {
        let url = format!("{}/{}", self.url, api.trim_start_matches('/'));
        let resp = self
            .client
            .get(&url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| MetricsError::UpstreamUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(MetricsError::UpstreamUnavailable(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }

        resp.text()
            .await
            .map_err(|e| MetricsError::UpstreamUnavailable(e.to_string()))
    }
}
