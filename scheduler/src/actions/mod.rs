pub mod allocate;

use async_trait::async_trait;

use crate::framework::Session;

/// One pass of a scheduling policy over the session.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, ssn: &Session);
}

/// Resolve configured action names; unknown names are logged and skipped.
pub fn new_actions(names: &[String]) -> Vec<Box<dyn Action>> {
    names
        .iter()
        .filter_map(|name| -> Option<Box<dyn Action>> {
            match name.as_str() {
                "allocate" => Some(Box::new(allocate::AllocateAction)),
                other => {
                    tracing::warn!(action=%other, "Unknown action, skipping");
                    None
                }
            }
        })
        .collect()
}
