//! In-memory stand-ins for the swarm, the coordinator and the readiness probe.
//!
//! Each fake is cheap to clone and clones share state, so a test can hand one to the
//! control loop and keep another to drive or inspect it.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::StatusCode;
use tokio::sync::mpsc;

use crate::docker::models::{Actor, NetworkAttachment};
use crate::docker::{Event, EventSource, Filters, Orchestrator, Service, Task};
use crate::error::{OrchestratorError, StoreError};
use crate::node::Node;
use crate::readiness::ReadinessProber;
use crate::store::MembershipStore;

pub fn hosts(hosts: &[&str]) -> BTreeSet<String> {
    hosts.iter().map(|host| host.to_string()).collect()
}

pub fn task(id: &str, desired_state: &str, address: Option<&str>) -> Task {
    Task {
        id: Some(id.to_owned()),
        desired_state: Some(desired_state.to_owned()),
        networks_attachments: Some(vec![NetworkAttachment {
            addresses: Some(address.map(str::to_owned).into_iter().collect()),
        }]),
    }
}

/// One running task per address.
pub fn running(addresses: &[&str]) -> Vec<Task> {
    addresses
        .iter()
        .enumerate()
        .map(|(i, address)| task(&format!("t{i}"), "running", Some(address)))
        .collect()
}

pub fn event(kind: &str, actor_id: &str, attributes: &[(&str, &str)]) -> Event {
    Event {
        kind: kind.to_owned(),
        action: Some("update".to_owned()),
        actor: Actor {
            id: actor_id.to_owned(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        },
    }
}

#[derive(Default)]
struct SwarmState {
    containers: HashMap<String, HashMap<String, String>>,
    services: Vec<Service>,
    tasks: Mutex<Vec<Task>>,
    service_queries: Mutex<Vec<Filters>>,
    task_queries: Mutex<Vec<String>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

#[derive(Clone, Default)]
pub struct FakeSwarm {
    state: Arc<SwarmState>,
}

impl FakeSwarm {
    fn state_mut(&mut self) -> &mut SwarmState {
        Arc::get_mut(&mut self.state).expect("configure the fake before cloning it")
    }

    pub fn with_container(mut self, id: &str, labels: &[(&str, &str)]) -> Self {
        let labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.state_mut().containers.insert(id.to_owned(), labels);
        self
    }

    pub fn with_services(mut self, services: Vec<Service>) -> Self {
        self.state_mut().services = services;
        self
    }

    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        self.set_tasks(tasks);
        self
    }

    /// Returns the sending half of the event stream the fake will hand out.
    pub fn with_event_channel(mut self) -> (Self, mpsc::UnboundedSender<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state_mut().events = Mutex::new(Some(rx));
        (self, tx)
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        *self.state.tasks.lock().unwrap() = tasks;
    }

    pub fn service_queries(&self) -> Vec<Filters> {
        self.state.service_queries.lock().unwrap().clone()
    }

    pub fn task_queries(&self) -> Vec<String> {
        self.state.task_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Orchestrator for FakeSwarm {
    type Events = FakeEvents;

    async fn container_labels(
        &self,
        id: &str,
    ) -> Result<HashMap<String, String>, OrchestratorError> {
        self.state
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnexpectedStatus {
                path: format!("/containers/{id}/json"),
                status: StatusCode::NOT_FOUND,
                body: format!("No such container: {id}"),
            })
    }

    async fn list_services(&self, filters: &Filters) -> Result<Vec<Service>, OrchestratorError> {
        self.state
            .service_queries
            .lock()
            .unwrap()
            .push(filters.clone());
        Ok(self.state.services.clone())
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<Task>, OrchestratorError> {
        self.state
            .task_queries
            .lock()
            .unwrap()
            .push(service_id.to_owned());
        Ok(self.state.tasks.lock().unwrap().clone())
    }

    async fn events(&self) -> Result<FakeEvents, OrchestratorError> {
        let rx = self.state.events.lock().unwrap().take();
        rx.map(|rx| FakeEvents { rx })
            .ok_or(OrchestratorError::EventStreamClosed)
    }
}

pub struct FakeEvents {
    rx: mpsc::UnboundedReceiver<Event>,
}

#[async_trait]
impl EventSource for FakeEvents {
    async fn next_event(&mut self) -> Result<Event, OrchestratorError> {
        self.rx
            .recv()
            .await
            .ok_or(OrchestratorError::EventStreamClosed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    List,
    Add(String),
    Remove(String),
    Rebalance,
}

#[derive(Default)]
struct StoreState {
    active: BTreeSet<String>,
    ops: Vec<Op>,
    failing_add: Option<String>,
}

/// A coordinator that keeps its worker list in memory and records every call.
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<StoreState>>,
}

impl FakeStore {
    pub fn with_active(active: &[&str]) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().active = hosts(active);
        store
    }

    pub fn failing_add(self, host: &str) -> Self {
        self.state.lock().unwrap().failing_add = Some(host.to_owned());
        self
    }

    pub fn active(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().active.clone()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Op) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter(|op| predicate(op))
            .count()
    }

    pub fn clear_ops(&mut self) {
        self.state.lock().unwrap().ops.clear();
    }
}

#[async_trait]
impl MembershipStore for FakeStore {
    async fn list_active_workers(&mut self) -> Result<BTreeSet<String>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::List);
        Ok(state.active.clone())
    }

    async fn add_worker(&mut self, node: &Node) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_add.as_deref() == Some(node.host.as_str()) {
            return Err(StoreError::QueryError(sqlx::Error::Protocol(format!(
                "could not add {}",
                node
            ))));
        }
        state.ops.push(Op::Add(node.host.clone()));
        state.active.insert(node.host.clone());
        Ok(())
    }

    async fn remove_worker(&mut self, node: &Node) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(Op::Remove(node.host.clone()));
        state.active.remove(&node.host);
        Ok(())
    }

    async fn rebalance_shards(&mut self) -> Result<(), StoreError> {
        self.state.lock().unwrap().ops.push(Op::Rebalance);
        Ok(())
    }
}

/// A prober that reports a node ready only after it has been probed a given number
/// of times. Nodes not listed are ready straight away, `u32::MAX` means never.
#[derive(Clone, Default)]
pub struct ScriptedProber {
    failures_before_ready: HashMap<String, u32>,
    probes: Arc<Mutex<HashMap<String, u32>>>,
    total: Arc<AtomicU32>,
}

impl ScriptedProber {
    pub fn not_ready_for(mut self, host: &str, failures: u32) -> Self {
        self.failures_before_ready.insert(host.to_owned(), failures);
        self
    }

    pub fn never_ready(self, host: &str) -> Self {
        self.not_ready_for(host, u32::MAX)
    }

    pub fn probes(&self, host: &str) -> u32 {
        *self.probes.lock().unwrap().get(host).unwrap_or(&0)
    }

    pub fn total_probes(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadinessProber for ScriptedProber {
    async fn is_ready(&self, node: &Node) -> bool {
        self.total.fetch_add(1, Ordering::SeqCst);
        let mut probes = self.probes.lock().unwrap();
        let seen = probes.entry(node.host.clone()).or_insert(0);
        *seen = seen.saturating_add(1);

        let failures = *self.failures_before_ready.get(&node.host).unwrap_or(&0);
        *seen > failures
    }
}
