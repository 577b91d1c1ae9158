mod cache;
mod client;
pub mod types;

pub use cache::NodeMetricsCache;
pub use client::MetricsClient;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shared::quantity::parse_quantity;

use crate::api::Resource;
use crate::config::{ArchimedesOptions, ConfigError};

use self::types::NodeRIMetric;

/// Telemetry failure modes; the poller logs and retries on its next tick.
#[derive(Debug)]
pub enum MetricsError {
    /// Transport-level failure reaching the metrics service.
    UpstreamUnavailable(String),
    /// The service answered with something we cannot decode.
    UpstreamMalformed(String),
    /// The service answered with an empty batch.
    NoMetrics,
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            MetricsError::UpstreamMalformed(msg) => write!(f, "Upstream malformed: {}", msg),
            MetricsError::NoMetrics => write!(f, "No metrics returned"),
        }
    }
}

/// How live usage replaces the request-based `used` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluateType {
    /// Live usage acts as a floor under the static request view.
    Max,
    /// Live usage replaces the static view unconditionally.
    Weighted,
}

/// Handle over the telemetry client and its polling loops.
///
/// Constructed once at startup and injected into the overlay plugin; there
/// is deliberately no process-wide singleton, so initialisation order stays
/// explicit and tests can build their own handles.
pub struct ArchimedesMetrics {
    ready: AtomicBool,
    node_metrics_enabled: bool,
    node_allocatable_enabled: bool,
    ri_enabled: bool,
    sync_period: Duration,

    pub evaluate_type: EvaluateType,
    pub mem_usage_ratio: f64,
    pub cpu_usage_ratio: f64,
    /// Bytes held back per node on top of measured usage.
    pub reserved_memory: f64,
    /// Milli-cores held back per node on top of measured usage.
    pub reserved_milli_cpu: f64,
    pub mem_allocatable_ratio: f64,
    pub cpu_allocatable_ratio: f64,

    client: Option<MetricsClient>,
}

impl ArchimedesMetrics {
    pub fn new(opts: &ArchimedesOptions) -> Result<Arc<Self>, ConfigError> {
        let reserved_memory = parse_quantity(&opts.reserved_memory)
            .map_err(|e| ConfigError(format!("archimedes-node-reserved-memory: {}", e)))?;

        let evaluate_type = match opts.evaluate_type.as_str() {
            "max" => EvaluateType::Max,
            "weighted" => EvaluateType::Weighted,
            other => {
                return Err(ConfigError(format!(
                    "unknown archimedes-request-evaluate-type '{}'",
                    other
                )))
            }
        };

        let enabled = opts.use_node_metrics || opts.use_node_allocatable || opts.use_runtime_info;
        Ok(Arc::new(ArchimedesMetrics {
            ready: AtomicBool::new(false),
            node_metrics_enabled: opts.use_node_metrics,
            node_allocatable_enabled: opts.use_node_allocatable,
            ri_enabled: opts.use_runtime_info,
            sync_period: opts.sync_period,
            evaluate_type,
            mem_usage_ratio: opts.mem_usage_ratio,
            cpu_usage_ratio: opts.cpu_usage_ratio,
            reserved_memory,
            reserved_milli_cpu: opts.reserved_cpu as f64 * 1000.0,
            mem_allocatable_ratio: opts.mem_allocatable_ratio,
            cpu_allocatable_ratio: opts.cpu_allocatable_ratio,
            client: enabled.then(|| MetricsClient::new(opts)),
        }))
    }

    /// True once a full sync has succeeded; the overlay plugin checks this
    /// before trusting any reading.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Spawn the polling loops. One task covers usage + allocatable, one
    /// covers runtime info when that feature is on. Individual failures are
    /// logged and retried on the next tick; the loops never exit.
    pub fn start(self: Arc<Self>) {
        if self.client.is_none() {
            tracing::info!("Telemetry disabled, no metrics pollers started");
            return;
        }

        if self.node_metrics_enabled || self.node_allocatable_enabled {
            let metrics = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(metrics.sync_period);
                loop {
                    ticker.tick().await;
                    metrics.sync_node_metrics().await;
                }
            });
        }

        if self.ri_enabled {
            let metrics = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(metrics.sync_period);
                loop {
                    ticker.tick().await;
                    metrics.sync_ri_metrics().await;
                }
            });
        }
    }

    /// One polling tick for usage + allocatable; flips `ready` on the first
    /// fully successful pass.
    pub async fn sync_node_metrics(&self) {
        let Some(client) = &self.client else { return };
        let mut ok = true;

        if self.node_metrics_enabled {
            match client.get_all_node_metrics().await {
                Ok(ts) => tracing::debug!(timestamp=%ts, "Synced node usage metrics"),
                Err(err) => {
                    ok = false;
                    tracing::error!(error=%err, "Failed to sync node usage metrics");
                }
            }
        }
        if self.node_allocatable_enabled {
            match client.get_all_node_allocatable().await {
                Ok(ts) => tracing::debug!(timestamp=%ts, "Synced node allocatable metrics"),
                Err(err) => {
                    ok = false;
                    tracing::error!(error=%err, "Failed to sync node allocatable metrics");
                }
            }
        }

        if ok && !self.is_ready() {
            tracing::info!("Telemetry cold start complete");
            self.ready.store(true, Ordering::Relaxed);
        }
    }

    /// One polling tick for runtime-info readings.
    pub async fn sync_ri_metrics(&self) {
        let Some(client) = &self.client else { return };
        if let Err(err) = client.get_all_node_ri_metrics().await {
            tracing::error!(error=%err, "Failed to sync runtime-info metrics");
        }
    }

    pub fn get_node_metrics(&self, name: &str) -> Option<Resource> {
        self.client.as_ref()?.get_node_metrics(name)
    }

    pub fn get_node_allocatable(&self, name: &str) -> Option<Resource> {
        self.client.as_ref()?.get_node_allocatable(name)
    }

    pub fn get_node_ri_metrics(&self, name: &str) -> Option<NodeRIMetric> {
        self.client.as_ref()?.get_node_ri_metrics(name)
    }

    #[cfg(test)]
    pub fn force_ready_with_client(opts: &ArchimedesOptions) -> Arc<Self> {
        let metrics = ArchimedesMetrics::new(opts).unwrap();
        metrics.ready.store(true, Ordering::Relaxed);
        metrics
    }
}
