//! Keeps the worker list of a Citus coordinator in sync with the running tasks of the
//! worker service in a Docker Swarm stack.

pub mod config;
pub mod connector;
pub mod control_loop;
pub mod docker;
pub mod error;
pub mod handlers;
pub mod metrics_consts;
pub mod node;
pub mod readiness;
pub mod reconciler;
pub mod store;
pub mod tasks;
pub mod topology;

#[cfg(test)]
mod testing;
