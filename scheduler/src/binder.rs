use async_trait::async_trait;
use reqwest::Client;
use shared::api::{PodField, PodPatch};
use std::time::Duration;

use crate::api::{ScheduleError, TaskInfo};

/// Seam for externalising placement decisions (e.g. apiserver, test double).
#[async_trait]
pub trait Binder: Send + Sync {
    async fn bind(&self, task: &TaskInfo, node: &str) -> Result<(), ScheduleError>;
}

/// Binds tasks by patching the pod's node assignment on the apiserver.
pub struct ApiBinder {
    client: Client,
    base_url: String,
}

impl ApiBinder {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        ApiBinder {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Binder for ApiBinder {
    async fn bind(&self, task: &TaskInfo, node: &str) -> Result<(), ScheduleError> {
        let url = format!("{}/pods/{}/{}", self.base_url, task.namespace, task.name);
        let patch = PodPatch {
            pod_field: PodField::NodeName,
            key: None,
            value: node.to_string(),
        };

        match self.client.patch(&url).json(&patch).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(task=%task.name, %node, "Bound");
                Ok(())
            }
            Ok(resp) => Err(ScheduleError::Bind(format!(
                "apiserver returned {} for {}",
                resp.status(),
                url
            ))),
            Err(err) => Err(ScheduleError::Bind(err.to_string())),
        }
    }
}

#[cfg(test)]
pub mod test_binder {
    use super::*;
    use std::sync::Mutex;

    /// Records bind calls instead of issuing RPCs.
    #[derive(Default)]
    pub struct FakeBinder {
        pub bound: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Binder for FakeBinder {
        async fn bind(&self, task: &TaskInfo, node: &str) -> Result<(), ScheduleError> {
            self.bound
                .lock()
                .unwrap()
                .push((task.name.clone(), node.to_string()));
            Ok(())
        }
    }
}
