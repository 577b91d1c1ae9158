use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use shared::models::Pod;

pub type State = Arc<PgState>;

/// Local caches fed by the pod and pod-group watch streams; the lister the
/// synthesizer consults before creating anything.
#[derive(Debug, Default)]
pub struct PgState {
    pods: DashMap<String, Pod>,
    podgroups: DashSet<String>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

impl PgState {
    pub fn new() -> State {
        Arc::new(PgState::default())
    }

    pub fn add_pod(&self, pod: &Pod) {
        self.pods
            .insert(key(&pod.metadata.namespace, &pod.metadata.name), pod.clone());
    }

    pub fn delete_pod(&self, namespace: &str, name: &str) {
        self.pods.remove(&key(namespace, name));
    }

    pub fn get_pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        self.pods.get(&key(namespace, name)).map(|p| p.value().clone())
    }

    pub fn add_podgroup(&self, namespace: &str, name: &str) {
        self.podgroups.insert(key(namespace, name));
    }

    pub fn delete_podgroup(&self, namespace: &str, name: &str) {
        self.podgroups.remove(&key(namespace, name));
    }

    pub fn podgroup_exists(&self, namespace: &str, name: &str) -> bool {
        self.podgroups.contains(&key(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pods_are_keyed_by_namespace_and_name() {
        let state = PgState::new();
        let mut pod = Pod::default();
        pod.metadata.namespace = "team-a".to_string();
        pod.metadata.name = "worker".to_string();
        state.add_pod(&pod);

        assert!(state.get_pod("team-a", "worker").is_some());
        assert!(state.get_pod("team-b", "worker").is_none());

        state.delete_pod("team-a", "worker");
        assert!(state.get_pod("team-a", "worker").is_none());
    }
}
