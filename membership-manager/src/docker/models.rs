//! The subset of the Docker Engine API objects the manager reads.
//!
//! Only fields we need are declared, everything else in the payloads is ignored.
//! Most fields are optional in practice (Docker omits or nulls them freely), so they
//! default instead of failing the decode.

use std::collections::HashMap;

use serde::Deserialize;

pub const DESIRED_STATE_RUNNING: &str = "running";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInspect {
    #[serde(default)]
    pub config: Option<ContainerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub spec: Option<ServiceSpec>,
}

impl Service {
    pub fn name(&self) -> Option<&str> {
        self.spec.as_ref().and_then(|spec| spec.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSpec {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub desired_state: Option<String>,
    #[serde(default)]
    pub networks_attachments: Option<Vec<NetworkAttachment>>,
}

impl Task {
    pub fn is_desired_running(&self) -> bool {
        self.desired_state.as_deref() == Some(DESIRED_STATE_RUNNING)
    }

    /// The first address of the first network the task is attached to, as reported by
    /// Docker (usually with a subnet suffix).
    pub fn first_address(&self) -> Option<&str> {
        self.networks_attachments
            .as_ref()?
            .first()?
            .addresses
            .as_ref()?
            .first()
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkAttachment {
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub actor: Actor,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Actor {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}
