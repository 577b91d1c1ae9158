mod session;
mod statement;

pub use session::{
    BatchNodeOrderFn, CompareFn, JobReadyFn, JobValidFn, NodeOrderFn, NodeReduceFn, OverusedFn,
    PredicateFn, Session,
};
pub use statement::Statement;

use std::sync::Arc;

use crate::binder::Binder;
use crate::cache::Snapshot;
use crate::config::SchedTuning;
use crate::plugins::Plugin;

/// Build the per-cycle session from a cluster snapshot and let every enabled
/// plugin install its capabilities.
pub fn open_session(
    snapshot: Snapshot,
    tuning: SchedTuning,
    binder: Arc<dyn Binder>,
    plugins: &[Box<dyn Plugin>],
) -> Session {
    let mut ssn = Session::new(snapshot, tuning, binder);
    for plugin in plugins {
        plugin.on_session_open(&mut ssn);
    }
    tracing::debug!(
        session=%ssn.uid,
        jobs = ssn.jobs.len(),
        nodes = ssn.nodes.len(),
        queues = ssn.queues.len(),
        "Session opened"
    );
    ssn
}

/// Tear the session down; the snapshot is dropped with it.
pub fn close_session(ssn: &mut Session, plugins: &[Box<dyn Plugin>]) {
    for plugin in plugins {
        plugin.on_session_close(ssn);
    }
    tracing::debug!(session=%ssn.uid, "Session closed");
}
