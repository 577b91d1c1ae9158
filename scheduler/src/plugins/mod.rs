pub mod archimedes;
pub mod gang;
pub mod nodeorder;
pub mod priority;
pub mod proportion;

use std::sync::Arc;

use crate::framework::Session;
use crate::metrics::ArchimedesMetrics;

/// A plugin installs ordering, predicate and readiness capabilities on the
/// session at cycle start.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn on_session_open(&self, ssn: &mut Session);
    fn on_session_close(&self, _ssn: &mut Session) {}
}

/// Resolve configured plugin names into instances. Unknown names are logged
/// and skipped so a typo in the conf file does not take the scheduler down.
pub fn new_plugins(names: &[String], metrics: &Arc<ArchimedesMetrics>) -> Vec<Box<dyn Plugin>> {
    names
        .iter()
        .filter_map(|name| -> Option<Box<dyn Plugin>> {
            match name.as_str() {
                "gang" => Some(Box::new(gang::GangPlugin)),
                "priority" => Some(Box::new(priority::PriorityPlugin)),
                "proportion" => Some(Box::new(proportion::ProportionPlugin)),
                "nodeorder" => Some(Box::new(nodeorder::NodeOrderPlugin)),
                "archimedes" => Some(Box::new(archimedes::ArchimedesPlugin::new(metrics.clone()))),
                other => {
                    tracing::warn!(plugin=%other, "Unknown plugin, skipping");
                    None
                }
            }
        })
        .collect()
}
