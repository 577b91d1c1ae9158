use std::sync::Arc;

use crate::api::{NodeInfo, Resource};
use crate::framework::Session;
use crate::metrics::{ArchimedesMetrics, EvaluateType};

use super::Plugin;

/// Rewrites each node's `used`/`idle` from live telemetry at session open,
/// so nodes whose pods request little but burn much stop looking idle, and
/// nodes with headroom above their requests get reused.
pub struct ArchimedesPlugin {
    metrics: Arc<ArchimedesMetrics>,
}

impl ArchimedesPlugin {
    pub fn new(metrics: Arc<ArchimedesMetrics>) -> Self {
        ArchimedesPlugin { metrics }
    }
}

impl Plugin for ArchimedesPlugin {
    fn name(&self) -> &'static str {
        "archimedes"
    }

    fn on_session_open(&self, ssn: &mut Session) {
        if !self.metrics.is_ready() {
            tracing::debug!("Telemetry not ready, node usage left as requested");
            return;
        }

        for mut entry in ssn.nodes.iter_mut() {
            // a node without a reading keeps its request-based view
            let Some(usage) = self.metrics.get_node_metrics(entry.key()) else {
                continue;
            };
            let used = requested_resource(entry.value(), &usage, &self.metrics);
            tracing::debug!(
                node=%entry.key(),
                used_cpu = used.milli_cpu,
                used_memory = used.memory,
                "Overlaying node usage from telemetry"
            );
            entry.value_mut().set_used(used);
        }
    }
}

/// The overlayed `used` vector for one node.
fn requested_resource(
    node: &NodeInfo,
    usage: &Resource,
    metrics: &ArchimedesMetrics,
) -> Resource {
    let cpu = usage.milli_cpu * metrics.cpu_usage_ratio + metrics.reserved_milli_cpu;
    let memory = usage.memory * metrics.mem_usage_ratio + metrics.reserved_memory;

    match metrics.evaluate_type {
        // telemetry is a floor under the request view
        EvaluateType::Max => Resource::new(
            cpu.max(node.used.milli_cpu),
            memory.max(node.used.memory),
        ),
        EvaluateType::Weighted => Resource::new(cpu, memory),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchimedesOptions;
    use std::time::Duration;

    const GI: f64 = 1024.0 * 1024.0 * 1024.0;

    fn options(evaluate_type: &str) -> ArchimedesOptions {
        ArchimedesOptions {
            use_node_metrics: true,
            use_node_allocatable: false,
            url: "http://unused".to_string(),
            sync_period: Duration::from_secs(120),
            timeout: Duration::from_secs(5),
            expiration: Duration::from_secs(300),
            mem_usage_ratio: 1.0,
            cpu_usage_ratio: 1.0,
            reserved_memory: "0".to_string(),
            reserved_cpu: 0,
            evaluate_type: evaluate_type.to_string(),
            mem_allocatable_ratio: 1.0,
            cpu_allocatable_ratio: 1.0,
            node_metrics_api: "node/metrics".to_string(),
            node_allocate_api: "node/allocatable".to_string(),
            use_runtime_info: false,
            ri_endpoint: "/node/rimetrics".to_string(),
        }
    }

    #[test]
    fn test_max_mode_floors_at_request_view() {
        let metrics = ArchimedesMetrics::force_ready_with_client(&options("max"));
        let mut node = NodeInfo::with_capacity("n1", Resource::new(4000.0, 8.0 * GI));
        node.allocate(&Resource::new(1000.0, 2.0 * GI)).unwrap();

        // live usage above requests wins
        let used = requested_resource(&node, &Resource::new(2500.0, 5.0 * GI), &metrics);
        assert_eq!(used, Resource::new(2500.0, 5.0 * GI));

        // live usage below requests keeps the request view
        let used = requested_resource(&node, &Resource::new(200.0, GI / 2.0), &metrics);
        assert_eq!(used, Resource::new(1000.0, 2.0 * GI));
    }

    #[test]
    fn test_weighted_mode_replaces_unconditionally() {
        let metrics = ArchimedesMetrics::force_ready_with_client(&options("weighted"));
        let mut node = NodeInfo::with_capacity("n1", Resource::new(4000.0, 8.0 * GI));
        node.allocate(&Resource::new(1000.0, 2.0 * GI)).unwrap();

        let used = requested_resource(&node, &Resource::new(200.0, GI / 2.0), &metrics);
        assert_eq!(used, Resource::new(200.0, GI / 2.0));
    }

    #[test]
    fn test_ratios_and_reservations_apply() {
        let mut opts = options("weighted");
        opts.mem_usage_ratio = 1.5;
        opts.reserved_cpu = 1;
        let metrics = ArchimedesMetrics::force_ready_with_client(&opts);
        let node = NodeInfo::with_capacity("n1", Resource::new(4000.0, 8.0 * GI));

        let used = requested_resource(&node, &Resource::new(1000.0, 2.0 * GI), &metrics);
        assert_eq!(used.milli_cpu, 2000.0);
        assert_eq!(used.memory, 3.0 * GI);
    }
}
