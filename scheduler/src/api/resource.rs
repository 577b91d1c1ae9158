use shared::models::ResourceList;
use shared::quantity::{parse_quantity, ParseError};

/// Requests below these thresholds count as empty (best-effort).
const MIN_MILLI_CPU: f64 = 10.0;
const MIN_MEMORY: f64 = 10.0 * 1024.0 * 1024.0;

/// Two-dimensional resource vector.
///
/// Components may go negative: the metrics overlay deliberately pushes
/// `idle` below zero when live usage exceeds the request view, which makes
/// every fit predicate fail on that node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Resource {
    pub milli_cpu: f64,
    pub memory: f64,
}

impl Resource {
    pub fn new(milli_cpu: f64, memory: f64) -> Self {
        Resource { milli_cpu, memory }
    }

    /// Build from a quantity map, e.g. `{"cpu": "2500m", "memory": "2Gi"}`.
    pub fn from_resource_list(list: &ResourceList) -> Result<Self, ParseError> {
        let mut res = Resource::default();
        if let Some(cpu) = list.get("cpu") {
            res.milli_cpu = parse_quantity(cpu)? * 1000.0;
        }
        if let Some(memory) = list.get("memory") {
            res.memory = parse_quantity(memory)?;
        }
        Ok(res)
    }

    pub fn add(&mut self, other: &Resource) -> &mut Self {
        self.milli_cpu += other.milli_cpu;
        self.memory += other.memory;
        self
    }

    pub fn sub(&mut self, other: &Resource) -> &mut Self {
        self.milli_cpu -= other.milli_cpu;
        self.memory -= other.memory;
        self
    }

    /// Component-wise comparison; true when every dimension fits.
    pub fn less_equal(&self, other: &Resource) -> bool {
        self.milli_cpu <= other.milli_cpu && self.memory <= other.memory
    }

    /// Whether the request is too small to account for (best-effort).
    pub fn is_empty(&self) -> bool {
        self.milli_cpu < MIN_MILLI_CPU && self.memory < MIN_MEMORY
    }

    /// Rewrite self into the component-wise shortfall against `req`:
    /// `min(have - req, 0)`. A vector that already covers `req` becomes zero.
    pub fn fit_delta(&mut self, req: &Resource) -> &mut Self {
        self.milli_cpu = (self.milli_cpu - req.milli_cpu).min(0.0);
        self.memory = (self.memory - req.memory).min(0.0);
        self
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cpu {:.0}m, memory {:.0}", self.milli_cpu, self.memory)
    }
}
