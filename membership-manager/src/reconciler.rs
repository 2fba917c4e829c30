use std::collections::BTreeSet;
use std::time;

use tracing::info;

use crate::docker::Orchestrator;
use crate::error::ManagerError;
use crate::metrics_consts::*;
use crate::node::Node;
use crate::readiness::{wait_until_ready, ReadinessProber, RetryPolicy};
use crate::store::MembershipStore;
use crate::tasks::healthy_addresses;
use crate::topology::ServiceHandle;

/// What a pass has to change to make the coordinator match the swarm.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconciliationDelta {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

impl ReconciliationDelta {
    pub fn compute(healthy: &BTreeSet<String>, active: &BTreeSet<String>) -> Self {
        Self {
            to_add: healthy.difference(active).cloned().collect(),
            to_remove: active.difference(healthy).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

// Mostly for testing: the changes a pass applied
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub rebalances: u32,
}

pub struct Reconciler {
    /// Port every worker listens on.
    port: u16,
    /// How long to let swarm catch up before reading the task list.
    settle_delay: time::Duration,
    /// How to wait for a new worker to accept connections before adding it.
    readiness: RetryPolicy,
}

impl Reconciler {
    pub fn new(port: u16, settle_delay: time::Duration, readiness: RetryPolicy) -> Self {
        Self {
            port,
            settle_delay,
            readiness,
        }
    }

    /// Make the coordinator's active workers match the running tasks of `service`.
    ///
    /// Both sides are read fresh, so a pass converges whatever happened before it. New
    /// workers are added (each once it accepts connections) and rebalanced first, stale
    /// ones are removed and rebalanced after. Any error aborts the pass.
    pub async fn reconcile<O, P, S>(
        &self,
        orchestrator: &O,
        prober: &P,
        store: &mut S,
        service: &ServiceHandle,
    ) -> Result<ReconcileOutcome, ManagerError>
    where
        O: Orchestrator + ?Sized,
        P: ReadinessProber + ?Sized,
        S: MembershipStore + ?Sized,
    {
        let _timing = common_metrics::timing_guard(RECONCILE_TIME, &[]);
        common_metrics::inc(RECONCILE_PASSES, &[], 1);

        let healthy = healthy_addresses(orchestrator, service, self.settle_delay).await?;
        let active = store.list_active_workers().await?;

        let delta = ReconciliationDelta::compute(&healthy, &active);
        let mut outcome = ReconcileOutcome::default();

        if delta.is_empty() {
            info!("{} workers active, nothing to do", active.len());
            common_metrics::gauge(ACTIVE_WORKERS, &[], active.len() as f64);
            return Ok(outcome);
        }

        if !delta.to_add.is_empty() {
            for host in &delta.to_add {
                let node = Node::new(host.as_str(), self.port);
                wait_until_ready(prober, &node, &self.readiness).await?;
                store.add_worker(&node).await?;
                outcome.added.push(node.host);
            }
            common_metrics::inc(NODES_ADDED, &[], outcome.added.len() as u64);

            store.rebalance_shards().await?;
            outcome.rebalances += 1;
        }

        if !delta.to_remove.is_empty() {
            for host in &delta.to_remove {
                let node = Node::new(host.as_str(), self.port);
                store.remove_worker(&node).await?;
                outcome.removed.push(node.host);
            }
            common_metrics::inc(NODES_REMOVED, &[], outcome.removed.len() as u64);

            store.rebalance_shards().await?;
            outcome.rebalances += 1;
        }

        common_metrics::inc(REBALANCES, &[], u64::from(outcome.rebalances));
        common_metrics::gauge(ACTIVE_WORKERS, &[], healthy.len() as f64);

        info!(
            "reconciled workers: added {:?}, removed {:?}",
            outcome.added, outcome.removed
        );

        Ok(outcome)
    }
}
