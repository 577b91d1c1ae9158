use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata carried by every top-level object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metadata {
    pub uid: Uuid,
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(rename = "ownerReferences", default)]
    pub owner_references: Vec<OwnerReference>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OwnerReference {
    pub uid: Uuid,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub controller: bool,
}

impl Metadata {
    /// The owner reference marked as controller, if any.
    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|o| o.controller)
    }
}

impl Default for Metadata {
    fn default() -> Self {
        let uid = Uuid::new_v4();
        Metadata {
            uid,
            name: uid.to_string(),
            namespace: "default".to_string(),
            annotations: HashMap::new(),
            labels: HashMap::new(),
            owner_references: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
