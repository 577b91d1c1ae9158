use std::sync::Arc;

use crate::actions::{new_actions, Action};
use crate::binder::Binder;
use crate::cache::ClusterCache;
use crate::config::{Config, SchedulerConf};
use crate::framework::{close_session, open_session};
use crate::metrics::ArchimedesMetrics;
use crate::plugins::{new_plugins, Plugin};

/// Drives one scheduling cycle per period against a fresh session.
pub struct Scheduler {
    cache: Arc<ClusterCache>,
    config: Config,
    actions: Vec<Box<dyn Action>>,
    plugins: Vec<Box<dyn Plugin>>,
    binder: Arc<dyn Binder>,
}

impl Scheduler {
    pub fn new(
        cache: Arc<ClusterCache>,
        config: Config,
        conf: SchedulerConf,
        metrics: Arc<ArchimedesMetrics>,
        binder: Arc<dyn Binder>,
    ) -> Self {
        let actions = new_actions(&conf.actions);
        let plugins = new_plugins(&conf.plugins, &metrics);
        Scheduler {
            cache,
            config,
            actions,
            plugins,
            binder,
        }
    }

    /// Run cycles forever. A cycle that overruns its period simply delays
    /// the next one; nothing is cancelled mid-flight.
    pub async fn run(&self) {
        tracing::info!(
            period = ?self.config.schedule_period,
            actions = self.actions.len(),
            plugins = self.plugins.len(),
            "Scheduler running"
        );
        let mut ticker = tokio::time::interval(self.config.schedule_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One cycle: snapshot, open session, run actions, close session.
    pub async fn run_once(&self) {
        let snapshot = self.cache.snapshot();
        let mut ssn = open_session(
            snapshot,
            self.config.tuning(),
            self.binder.clone(),
            &self.plugins,
        );
        for action in &self.actions {
            action.execute(&ssn).await;
        }
        close_session(&mut ssn, &self.plugins);
    }
}
