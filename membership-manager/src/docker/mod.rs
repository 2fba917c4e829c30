use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::error::OrchestratorError;

mod engine;
pub mod models;

pub use engine::{DockerEngine, EngineEvents, EventDecoder};
pub use models::{Event, Service, Task};

/// The orchestrator calls the manager depends on. `DockerEngine` is the real thing,
/// tests provide their own.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    type Events: EventSource;

    /// Labels of a container, looked up by id or name.
    async fn container_labels(&self, id: &str)
        -> Result<HashMap<String, String>, OrchestratorError>;

    async fn list_services(&self, filters: &Filters) -> Result<Vec<Service>, OrchestratorError>;

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<Task>, OrchestratorError>;

    /// Subscribe to the event stream, starting from now.
    async fn events(&self) -> Result<Self::Events, OrchestratorError>;
}

/// A blocking, infinite source of orchestrator events. Running out of events is an error.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Result<Event, OrchestratorError>;
}

/// Docker API list filters, e.g. `{"label": ["a=b", "c=d"], "name": ["x"]}`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filters(BTreeMap<String, Vec<String>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.entry(key.to_owned()).or_default().push(value.into());
        self
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Encode as the `filters` query parameter Docker expects.
    pub fn to_query(&self) -> Result<String, OrchestratorError> {
        let json = serde_json::to_string(&self.0)?;
        Ok(serde_urlencoded::to_string([("filters", json)])?)
    }
}
