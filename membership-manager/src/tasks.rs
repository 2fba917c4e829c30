use std::collections::BTreeSet;
use std::time;

use tracing::warn;

use crate::docker::{Orchestrator, Task};
use crate::error::OrchestratorError;
use crate::node::normalize_address;
use crate::topology::ServiceHandle;

/// Addresses of the service's tasks that swarm wants running.
///
/// Sleeps for `settle_delay` first: we are usually called right after a scale or node
/// event, and the task list takes a moment to reflect it.
pub async fn healthy_addresses<O>(
    orchestrator: &O,
    service: &ServiceHandle,
    settle_delay: time::Duration,
) -> Result<BTreeSet<String>, OrchestratorError>
where
    O: Orchestrator + ?Sized,
{
    tokio::time::sleep(settle_delay).await;

    let tasks = orchestrator.list_tasks(&service.id).await?;

    running_task_addresses(&tasks)
}

/// Bare host addresses of the tasks with a desired state of running. Duplicates collapse.
///
/// A running task without an address fails the whole lookup: leaving it out would make
/// its worker look gone, and removing a worker drops its shard placements.
pub fn running_task_addresses(tasks: &[Task]) -> Result<BTreeSet<String>, OrchestratorError> {
    tasks
        .iter()
        .filter(|task| task.is_desired_running())
        .map(|task| match task.first_address() {
            Some(address) => Ok(normalize_address(address).to_owned()),
            None => {
                let task = task.id.clone().unwrap_or_else(|| "<unknown>".to_owned());
                warn!("running task {} has no network address", task);
                Err(OrchestratorError::MissingTaskAddress { task })
            }
        })
        .collect()
}
