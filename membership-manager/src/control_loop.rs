use std::fmt;
use std::future::Future;

use tracing::{error, info};

use crate::config::{Config, NonEmptyString};
use crate::connector::connect_to_coordinator;
use crate::docker::{Event, EventSource, Orchestrator};
use crate::error::{ManagerError, ResolutionError};
use crate::metrics_consts::{EVENTS_RECEIVED, RECONCILE_FAILURES};
use crate::node::Node;
use crate::readiness::ReadinessProber;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::store::{CitusStore, MembershipStore};
use crate::topology::{ClusterContext, ServiceRole, TopologyReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Ready,
    Listening,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Ready => write!(f, "ready"),
            Self::Listening => write!(f, "listening"),
            Self::ShuttingDown => write!(f, "shutting_down"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Why an event warrants a reconciliation pass, if it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scale,
    NodeDown,
    Ignore,
}

/// Only scaling the worker service and a swarm node going down change the worker set in
/// ways we care about. Anything else is ignored.
pub fn classify(event: &Event, worker_service_id: &str) -> Trigger {
    let attributes = &event.actor.attributes;

    match event.kind.as_str() {
        "service"
            if event.actor.id == worker_service_id && attributes.contains_key("replicas.new") =>
        {
            Trigger::Scale
        }
        "node" if attributes.get("state.new").map(String::as_str) == Some("down") => {
            Trigger::NodeDown
        }
        _ => Trigger::Ignore,
    }
}

/// The manager's single thread of control: one pass at startup, then one full pass per
/// relevant event, strictly one after the other.
pub struct ControlLoop<O, P, S> {
    orchestrator: O,
    prober: P,
    store: S,
    context: ClusterContext,
    reconciler: Reconciler,
    state: LoopState,
}

/// Resolve the stack, wait for the coordinator and open the session to it.
///
/// The coordinator is `CITUS_HOST` when set, otherwise the coordinator service of our
/// own stack. Resolution errors are fatal, the coordinator is waited on according to the
/// readiness policy.
pub async fn initialize<O, P>(
    config: &Config,
    orchestrator: O,
    prober: P,
) -> Result<ControlLoop<O, P, CitusStore>, ManagerError>
where
    O: Orchestrator,
    P: ReadinessProber,
{
    let configured_host = config.citus_host.as_ref().map(NonEmptyString::as_str);
    let coordinator_suffix = match configured_host {
        Some(_) => None,
        None => Some(config.coordinator_service.as_str()),
    };

    let context = TopologyReader::new(&orchestrator)
        .resolve_context(
            config.hostname.as_str(),
            config.worker_service.as_str(),
            coordinator_suffix,
        )
        .await?;

    let coordinator_host = context
        .coordinator_host(configured_host)
        .map(str::to_owned)
        .ok_or_else(|| ResolutionError::NotFound {
            role: ServiceRole::Coordinator.to_string(),
            name: config.coordinator_service.as_str().to_owned(),
        })?;
    let coordinator = Node::new(coordinator_host, config.postgres_port);

    let conn = connect_to_coordinator(
        &prober,
        &config.credentials(),
        &coordinator,
        &config.readiness_policy(),
    )
    .await?;

    let reconciler = Reconciler::new(
        config.postgres_port,
        config.settle_delay.0,
        config.readiness_policy(),
    );

    Ok(ControlLoop::new(
        orchestrator,
        prober,
        CitusStore::new(conn),
        context,
        reconciler,
    ))
}

impl<O, P, S> ControlLoop<O, P, S>
where
    O: Orchestrator,
    P: ReadinessProber,
    S: MembershipStore,
{
    pub fn new(
        orchestrator: O,
        prober: P,
        store: S,
        context: ClusterContext,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            orchestrator,
            prober,
            store,
            context,
            reconciler,
            state: LoopState::Init,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run until `shutdown` resolves or something fails.
    ///
    /// Shutdown is not a drain: whatever is in flight, a pass included, is abandoned and
    /// no final pass is made. Every error is fatal, including the event stream ending.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), ManagerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let finished = tokio::select! {
            _ = &mut shutdown => None,
            result = self.converge_and_listen() => Some(result),
        };

        let result = match finished {
            None => {
                info!("shutting down...");
                self.transition(LoopState::ShuttingDown);
                Ok(())
            }
            Some(result) => {
                if let Err(error) = &result {
                    error!("control loop failed: {}", error);
                }
                result
            }
        };
        self.transition(LoopState::Terminated);

        result
    }

    async fn converge_and_listen(&mut self) -> Result<(), ManagerError> {
        self.reconcile().await?;
        self.transition(LoopState::Ready);

        let mut events = self.orchestrator.events().await?;
        self.transition(LoopState::Listening);
        info!("listening for events...");

        loop {
            let event = events.next_event().await?;
            common_metrics::inc(
                EVENTS_RECEIVED,
                &[("type".to_owned(), event.kind.clone())],
                1,
            );

            match classify(&event, &self.context.worker_service.id) {
                Trigger::Ignore => continue,
                trigger => {
                    info!(
                        "{:?} event from {}, reconciling workers",
                        trigger, event.actor.id
                    );
                    self.reconcile().await?;
                }
            }
        }
    }

    async fn reconcile(&mut self) -> Result<ReconcileOutcome, ManagerError> {
        let result = self
            .reconciler
            .reconcile(
                &self.orchestrator,
                &self.prober,
                &mut self.store,
                &self.context.worker_service,
            )
            .await;

        if result.is_err() {
            common_metrics::inc(RECONCILE_FAILURES, &[], 1);
        }

        result
    }

    fn transition(&mut self, next: LoopState) {
        info!("control loop {} -> {}", self.state, next);
        self.state = next;
    }
}
