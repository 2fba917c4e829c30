use std::fmt;

use tracing::info;

use crate::docker::{Filters, Orchestrator, Service};
use crate::error::ResolutionError;

pub const STACK_LABEL: &str = "com.docker.stack.namespace";
pub const ROLE_LABEL: &str = "com.citusdata.role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Worker,
    Coordinator,
}

impl ServiceRole {
    pub fn label_value(&self) -> &'static str {
        match self {
            Self::Worker => "Worker",
            Self::Coordinator => "Coordinator",
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Worker => write!(f, "worker"),
            Self::Coordinator => write!(f, "coordinator"),
        }
    }
}

/// A swarm service we keep referring to after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceHandle {
    pub id: String,
    pub name: String,
}

/// Everything resolved once at startup about the stack we manage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterContext {
    pub stack: String,
    pub worker_service: ServiceHandle,
    /// Only looked up when the coordinator host is not configured explicitly.
    pub coordinator_service: Option<ServiceHandle>,
}

impl ClusterContext {
    /// Host to reach the coordinator at: the configured one, or the discovered service
    /// name, which resolves through the swarm's internal DNS.
    pub fn coordinator_host<'a>(&'a self, configured: Option<&'a str>) -> Option<&'a str> {
        configured.or_else(|| {
            self.coordinator_service
                .as_ref()
                .map(|service| service.name.as_str())
        })
    }
}

/// The outcome of a lookup that should match exactly one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    NotFound,
    Ambiguous(usize),
    Found(T),
}

impl<T> Lookup<T> {
    pub fn from_matches(mut matches: Vec<T>) -> Self {
        match matches.len() {
            0 => Lookup::NotFound,
            1 => Lookup::Found(matches.remove(0)),
            count => Lookup::Ambiguous(count),
        }
    }
}

/// Scoped service name: `docker stack deploy` prefixes every service with the stack name.
pub fn service_name(stack: &str, suffix: &str) -> String {
    format!("{stack}_{suffix}")
}

pub struct TopologyReader<'a, O> {
    orchestrator: &'a O,
}

impl<'a, O: Orchestrator> TopologyReader<'a, O> {
    pub fn new(orchestrator: &'a O) -> Self {
        Self { orchestrator }
    }

    /// Resolve the stack the manager container belongs to, and the services we need in it.
    ///
    /// The manager always runs inside the swarm it manages, so failing to inspect our own
    /// container is fatal.
    pub async fn resolve_context(
        &self,
        hostname: &str,
        worker_suffix: &str,
        coordinator_suffix: Option<&str>,
    ) -> Result<ClusterContext, ResolutionError> {
        let stack = self.stack_of(hostname).await?;

        info!("found swarm stack: {}", stack);

        let worker_service = self
            .find_service(&stack, ServiceRole::Worker, worker_suffix)
            .await?;

        let coordinator_service = match coordinator_suffix {
            Some(suffix) => Some(
                self.find_service(&stack, ServiceRole::Coordinator, suffix)
                    .await?,
            ),
            None => None,
        };

        Ok(ClusterContext {
            stack,
            worker_service,
            coordinator_service,
        })
    }

    async fn stack_of(&self, container: &str) -> Result<String, ResolutionError> {
        let labels = self.orchestrator.container_labels(container).await?;

        labels
            .get(STACK_LABEL)
            .cloned()
            .ok_or_else(|| ResolutionError::MissingStackLabel {
                container: container.to_owned(),
                label: STACK_LABEL.to_owned(),
            })
    }

    pub async fn find_service(
        &self,
        stack: &str,
        role: ServiceRole,
        suffix: &str,
    ) -> Result<ServiceHandle, ResolutionError> {
        let name = service_name(stack, suffix);
        let filters = Filters::new()
            .with("label", format!("{STACK_LABEL}={stack}"))
            .with("label", format!("{ROLE_LABEL}={}", role.label_value()))
            .with("name", name.as_str());

        let services = self.orchestrator.list_services(&filters).await?;

        // Docker matches names by prefix, so "citus_worker" also finds "citus_worker_2".
        let exact: Vec<Service> = services
            .into_iter()
            .filter(|service| service.name() == Some(name.as_str()))
            .collect();

        match Lookup::from_matches(exact) {
            Lookup::Found(service) => {
                let id = service
                    .id
                    .ok_or_else(|| ResolutionError::MissingServiceId(name.clone()))?;
                info!("found {} service {} ({})", role, name, id);
                Ok(ServiceHandle { id, name })
            }
            Lookup::NotFound => Err(ResolutionError::NotFound {
                role: role.to_string(),
                name,
            }),
            Lookup::Ambiguous(count) => Err(ResolutionError::Ambiguous {
                role: role.to_string(),
                name,
                count,
            }),
        }
    }
}
