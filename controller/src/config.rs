use clap::Parser;

/// Pod-group controller: wraps plain pods into singleton gangs so the
/// scheduler treats every pod uniformly.
#[derive(Parser, Debug, Clone)]
#[command(name = "g8s-controller", version, about, long_about = None)]
pub struct Config {
    /// Address of the cluster apiserver.
    #[arg(long, default_value = "http://localhost:7620")]
    pub master: String,

    /// Only pods whose `.spec.schedulerName` matches are wrapped.
    #[arg(long = "scheduler-name", default_value = "volcano")]
    pub scheduler_name: String,

    /// Queue assigned to synthesized pod-groups without a queue annotation.
    #[arg(long = "default-queue", default_value = "default")]
    pub default_queue: String,
}
