use std::fmt;
use std::time::Duration;

use clap::{ArgAction, Args, Parser};
use serde::Deserialize;
use shared::quantity::parse_duration;

/// Fatal startup misconfiguration.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

/// Batch gang-scheduler for the cluster: commits or discards whole job
/// allocations atomically and rebases node usage on live telemetry.
#[derive(Parser, Debug, Clone)]
#[command(name = "g8s-scheduler", version, about, long_about = None)]
pub struct Config {
    /// Address of the cluster apiserver.
    #[arg(long, default_value = "http://localhost:7620")]
    pub master: String,

    /// Only pods whose `.spec.schedulerName` matches are handled.
    #[arg(long = "scheduler-name", default_value = "volcano")]
    pub scheduler_name: String,

    /// Path of a JSON file listing enabled actions and plugins.
    #[arg(long = "scheduler-conf", default_value = "")]
    pub scheduler_conf: String,

    /// Period between scheduling cycles.
    #[arg(long = "schedule-period", default_value = "1s", value_parser = duration_arg)]
    pub schedule_period: Duration,

    /// Queue assumed for jobs that declare none.
    #[arg(long = "default-queue", default_value = "default")]
    pub default_queue: String,

    /// Gain leadership before scheduling; for replicated deployments.
    #[arg(long = "leader-elect", default_value_t = false)]
    pub leader_elect: bool,

    /// Namespace of the leader-election lock object.
    #[arg(long = "lock-object-namespace", default_value = "")]
    pub lock_object_namespace: String,

    /// Address to serve HTTP requests on.
    #[arg(long = "listen-address", default_value = ":8080")]
    pub listen_address: String,

    /// Address to serve /healthz on.
    #[arg(long = "healthz-bind-address", default_value = "127.0.0.1:11251")]
    pub healthz_bind_address: String,

    /// Respect pod priority classes at the group level.
    #[arg(long = "priority-class", default_value_t = true, action = ArgAction::Set)]
    pub priority_class: bool,

    /// QPS towards the apiserver.
    #[arg(long = "kube-api-qps", default_value_t = 50.0)]
    pub kube_api_qps: f32,

    /// Burst towards the apiserver.
    #[arg(long = "kube-api-burst", default_value_t = 100)]
    pub kube_api_burst: u32,

    /// Minimum number of feasible nodes to find and score.
    #[arg(long = "minimum-feasible-nodes", default_value_t = 100)]
    pub min_nodes_to_find: u32,

    /// Lower bound for the adaptive sampling percentage.
    #[arg(long = "minimum-percentage-nodes-to-find", default_value_t = 5)]
    pub min_percentage_of_nodes_to_find: u32,

    /// Percentage of nodes to find and score; non-positive selects an
    /// adaptive value based on cluster size.
    #[arg(long = "percentage-nodes-to-find", default_value_t = 100)]
    pub percentage_of_nodes_to_find: i32,

    #[command(flatten)]
    pub archimedes: ArchimedesOptions,
}

/// Live-telemetry (archimedes) knobs.
#[derive(Args, Debug, Clone)]
pub struct ArchimedesOptions {
    /// Use live node usage for scheduling.
    #[arg(long = "archimedes-metrics-use-node-metrics", default_value_t = false)]
    pub use_node_metrics: bool,

    /// Use predicted node allocatable values.
    #[arg(long = "archimedes-metrics-use-node-allocatable", default_value_t = false)]
    pub use_node_allocatable: bool,

    /// Base URL of the metrics service.
    #[arg(long = "archimedes-metrics-url", default_value = "")]
    pub url: String,

    #[arg(long = "archimedes-metrics-sync-period", default_value = "120s", value_parser = duration_arg)]
    pub sync_period: Duration,

    /// Per-request timeout against the metrics service.
    #[arg(long = "archimedes-metrics-timeout", default_value = "60s", value_parser = duration_arg)]
    pub timeout: Duration,

    /// Readings older than this are evicted instead of cached.
    #[arg(long = "archimedes-metrics-expiration", default_value = "300s", value_parser = duration_arg)]
    pub expiration: Duration,

    #[arg(long = "archimedes-memory-usage-ratio", default_value_t = 1.5)]
    pub mem_usage_ratio: f64,

    #[arg(long = "archimedes-cpu-usage-ratio", default_value_t = 1.0)]
    pub cpu_usage_ratio: f64,

    /// Memory held back per node, as a quantity string.
    #[arg(long = "archimedes-node-reserved-memory", default_value = "2Gi")]
    pub reserved_memory: String,

    /// CPU cores held back per node.
    #[arg(long = "archimedes-node-reserved-cpu", default_value_t = 0)]
    pub reserved_cpu: i64,

    /// How live usage replaces the request view: "max" or "weighted".
    #[arg(long = "archimedes-request-evaluate-type", default_value = "max")]
    pub evaluate_type: String,

    #[arg(long = "archimedes-memory-allocatable-ratio", default_value_t = 1.0)]
    pub mem_allocatable_ratio: f64,

    #[arg(long = "archimedes-cpu-allocatable-ratio", default_value_t = 1.0)]
    pub cpu_allocatable_ratio: f64,

    #[arg(long = "archimedes-metrics-node-metrics-api", default_value = "node/metrics")]
    pub node_metrics_api: String,

    #[arg(long = "archimedes-metrics-node-allocate-api", default_value = "node/allocatable")]
    pub node_allocate_api: String,

    /// Schedule on node runtime info.
    #[arg(long = "archimedes-node-runtime-info-schedule-enabled", default_value_t = false)]
    pub use_runtime_info: bool,

    #[arg(long = "archimedes-metrics-runtimeinfo-endpoints", default_value = "/node/rimetrics")]
    pub ri_endpoint: String,
}

/// Feasibility sampling knobs handed to the session.
#[derive(Debug, Clone, Copy)]
pub struct SchedTuning {
    pub min_nodes_to_find: u32,
    pub min_percentage_of_nodes_to_find: u32,
    pub percentage_of_nodes_to_find: i32,
}

impl Default for SchedTuning {
    fn default() -> Self {
        SchedTuning {
            min_nodes_to_find: 100,
            min_percentage_of_nodes_to_find: 5,
            percentage_of_nodes_to_find: 100,
        }
    }
}

/// Actions and plugins enabled for each cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConf {
    #[serde(default = "default_actions")]
    pub actions: Vec<String>,
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,
}

fn default_actions() -> Vec<String> {
    vec!["allocate".to_string()]
}

fn default_plugins() -> Vec<String> {
    ["gang", "priority", "proportion", "nodeorder", "archimedes"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SchedulerConf {
    fn default() -> Self {
        SchedulerConf {
            actions: default_actions(),
            plugins: default_plugins(),
        }
    }
}

impl Config {
    pub fn tuning(&self) -> SchedTuning {
        SchedTuning {
            min_nodes_to_find: self.min_nodes_to_find,
            min_percentage_of_nodes_to_find: self.min_percentage_of_nodes_to_find,
            percentage_of_nodes_to_find: self.percentage_of_nodes_to_find,
        }
    }

    /// Startup validation; failures are fatal.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.leader_elect && self.lock_object_namespace.is_empty() {
            return Err(ConfigError(
                "lock-object-namespace must not be empty when leader-elect is enabled".to_string(),
            ));
        }
        if self.archimedes.evaluate_type != "max" && self.archimedes.evaluate_type != "weighted" {
            return Err(ConfigError(format!(
                "unknown archimedes-request-evaluate-type '{}', expected max or weighted",
                self.archimedes.evaluate_type
            )));
        }
        Ok(())
    }

    /// Load the scheduler-conf file, falling back to defaults when no path
    /// is configured.
    pub fn load_scheduler_conf(&self) -> Result<SchedulerConf, ConfigError> {
        if self.scheduler_conf.is_empty() {
            return Ok(SchedulerConf::default());
        }
        let raw = std::fs::read_to_string(&self.scheduler_conf)
            .map_err(|e| ConfigError(format!("cannot read {}: {}", self.scheduler_conf, e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError(format!("cannot parse {}: {}", self.scheduler_conf, e)))
    }
}
