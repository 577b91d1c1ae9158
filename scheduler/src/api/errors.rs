use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

/// Why a node rejected a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitErrorKind {
    /// Request exceeds both `idle` and `releasing`.
    NodeResourceFit,
    /// A predicate plugin vetoed the placement.
    PredicatePlugin,
}

impl fmt::Display for FitErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitErrorKind::NodeResourceFit => write!(f, "node(s) resource fit failed"),
            FitErrorKind::PredicatePlugin => write!(f, "node(s) rejected by predicate"),
        }
    }
}

/// One `(task, node)` rejection.
#[derive(Debug, Clone)]
pub struct FitError {
    pub node: String,
    pub kind: FitErrorKind,
    pub message: String,
}

impl FitError {
    pub fn new(node: &str, kind: FitErrorKind) -> Self {
        FitError {
            node: node.to_string(),
            message: kind.to_string(),
            kind,
        }
    }

    pub fn with_message(node: &str, kind: FitErrorKind, message: String) -> Self {
        FitError {
            node: node.to_string(),
            kind,
            message,
        }
    }
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}: {}", self.node, self.message)
    }
}

/// All rejections a single task collected during one predicate pass.
#[derive(Debug, Clone, Default)]
pub struct FitErrors {
    pub errors: Vec<FitError>,
}

impl FitErrors {
    pub fn new() -> Self {
        FitErrors::default()
    }

    pub fn push(&mut self, err: FitError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for FitErrors {
    /// Aggregated operator-facing message, e.g. `3 node(s) resource fit failed`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for e in &self.errors {
            *counts.entry(e.message.as_str()).or_default() += 1;
        }
        let mut reasons: Vec<_> = counts.into_iter().collect();
        reasons.sort();
        let joined = reasons
            .iter()
            .map(|(msg, n)| format!("{} {}", n, msg))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}", joined)
    }
}

/// Errors raised while mutating or committing a scheduling statement.
#[derive(Debug)]
pub enum ScheduleError {
    NodeNotFound(String),
    JobNotFound(Uuid),
    TaskNotFound(Uuid),
    /// Idle capacity cannot cover the request.
    ResourceShortage(String),
    /// Bind RPC against the apiserver failed.
    Bind(String),
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::NodeNotFound(name) => write!(f, "Node not found: {}", name),
            ScheduleError::JobNotFound(uid) => write!(f, "Job not found: {}", uid),
            ScheduleError::TaskNotFound(uid) => write!(f, "Task not found: {}", uid),
            ScheduleError::ResourceShortage(msg) => write!(f, "Resource shortage: {}", msg),
            ScheduleError::Bind(msg) => write!(f, "Bind failed: {}", msg),
        }
    }
}
