use crate::framework::Session;

use super::Plugin;

/// Least-requested scoring: nodes with more headroom left score higher,
/// spreading load across the cluster. Scores are on a 0-100 scale.
pub struct NodeOrderPlugin;

impl Plugin for NodeOrderPlugin {
    fn name(&self) -> &'static str {
        "nodeorder"
    }

    fn on_session_open(&self, ssn: &mut Session) {
        ssn.add_node_order_fn(Box::new(|_task, node| {
            let cpu_frac = if node.allocatable.milli_cpu > 0.0 {
                (node.idle.milli_cpu / node.allocatable.milli_cpu).max(0.0)
            } else {
                0.0
            };
            let mem_frac = if node.allocatable.memory > 0.0 {
                (node.idle.memory / node.allocatable.memory).max(0.0)
            } else {
                0.0
            };
            (cpu_frac + mem_frac) / 2.0 * 100.0
        }));
    }
}
