pub const RECONCILE_PASSES: &str = "membership_manager_reconcile_passes";
pub const RECONCILE_TIME: &str = "membership_manager_reconcile_ms";
pub const RECONCILE_FAILURES: &str = "membership_manager_reconcile_failures";

pub const NODES_ADDED: &str = "membership_manager_nodes_added";
pub const NODES_REMOVED: &str = "membership_manager_nodes_removed";
pub const REBALANCES: &str = "membership_manager_rebalances";

// Current size of the worker set after the last successful pass
pub const ACTIVE_WORKERS: &str = "membership_manager_active_workers";

pub const EVENTS_RECEIVED: &str = "membership_manager_events_received";
pub const READINESS_PROBES_FAILED: &str = "membership_manager_readiness_probes_failed";
