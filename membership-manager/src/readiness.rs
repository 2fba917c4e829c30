use std::time;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use tracing::{debug, warn};

use crate::error::ConnectError;
use crate::metrics_consts::READINESS_PROBES_FAILED;
use crate::node::Node;

/// Process-wide credentials used for every database connection we open.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Credentials {
    pub fn connect_options(&self, node: &Node) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&node.host)
            .port(node.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Reports whether a database node accepts connections. Implementations never fail:
/// any connection error means "not ready".
#[async_trait]
pub trait ReadinessProber: Send + Sync {
    async fn is_ready(&self, node: &Node) -> bool;
}

pub struct PgReadinessProber {
    credentials: Credentials,
}

impl PgReadinessProber {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ReadinessProber for PgReadinessProber {
    async fn is_ready(&self, node: &Node) -> bool {
        let options = self.credentials.connect_options(node);

        match PgConnection::connect_with(&options).await {
            Ok(conn) => {
                if let Err(error) = conn.close().await {
                    debug!("failed to close readiness probe to {}: {}", node, error);
                }
                true
            }
            Err(error) => {
                debug!("readiness probe to {} failed: {}", node, error);
                common_metrics::inc(READINESS_PROBES_FAILED, &[], 1);
                false
            }
        }
    }
}

/// How long to wait between readiness probes, and whether to give up at all.
///
/// The default probes every second and never gives up, since the coordinator and the
/// workers we add are hard dependencies with no fallback. A ceiling and a backoff can
/// be configured to let a supervisor restart the process instead.
#[derive(Copy, Clone, Debug)]
pub struct RetryPolicy {
    /// Coefficient to multiply the interval with for every past attempt.
    backoff_coefficient: u32,
    /// The delay after the first failed probe.
    initial_interval: time::Duration,
    /// The maximum possible delay between probes.
    maximum_interval: Option<time::Duration>,
    /// Total number of probes before giving up. `None` retries forever.
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// A `backoff_coefficient` below 1 is treated as 1.
    pub fn new(initial_interval: time::Duration, backoff_coefficient: u32) -> Self {
        Self {
            backoff_coefficient: backoff_coefficient.max(1),
            initial_interval,
            maximum_interval: None,
            max_attempts: None,
        }
    }

    pub fn maximum_interval(mut self, interval: time::Duration) -> Self {
        self.maximum_interval = Some(interval);
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// The delay to sleep after `attempt` previous failures (zero-based).
    pub fn delay_for(&self, attempt: u32) -> time::Duration {
        let factor = self.backoff_coefficient.saturating_pow(attempt);
        let candidate = self
            .initial_interval
            .checked_mul(factor)
            .unwrap_or(time::Duration::MAX);

        match self.maximum_interval {
            Some(max) => std::cmp::min(candidate, max),
            None => candidate,
        }
    }

    /// Whether another probe may be made after `attempts` failed ones.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempts < max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(time::Duration::from_secs(1), 1)
    }
}

/// Probe `node` until it reports ready. With the default policy this only returns once
/// the node is ready, blocking the caller for as long as that takes.
pub async fn wait_until_ready<P>(
    prober: &P,
    node: &Node,
    policy: &RetryPolicy,
) -> Result<(), ConnectError>
where
    P: ReadinessProber + ?Sized,
{
    let mut attempts = 0u32;

    loop {
        if prober.is_ready(node).await {
            return Ok(());
        }

        attempts = attempts.saturating_add(1);
        if !policy.allows(attempts) {
            return Err(ConnectError::NotReady {
                host: node.host.clone(),
                attempts,
            });
        }

        let delay = policy.delay_for(attempts - 1);
        warn!(
            "could not connect to {}, trying again in {}ms",
            node,
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProber;

    #[test]
    fn default_policy_is_fixed_and_unbounded() {
        let policy = RetryPolicy::default();
        for attempt in [0, 1, 5, 1000] {
            assert_eq!(policy.delay_for(attempt), time::Duration::from_secs(1));
        }
        assert!(policy.allows(u32::MAX - 1));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(time::Duration::from_millis(100), 2)
            .maximum_interval(time::Duration::from_millis(500));

        assert_eq!(policy.delay_for(0), time::Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), time::Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), time::Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), time::Duration::from_millis(500));
        assert_eq!(policy.delay_for(64), time::Duration::from_millis(500));
    }

    #[test]
    fn zero_coefficient_keeps_the_initial_interval() {
        let policy = RetryPolicy::new(time::Duration::from_secs(1), 0);

        for attempt in 0..4 {
            assert_eq!(policy.delay_for(attempt), time::Duration::from_secs(1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_the_node_is_ready() {
        let prober = ScriptedProber::default().not_ready_for("coordinator", 3);
        let node = Node::new("coordinator", 5432);
        let start = tokio::time::Instant::now();

        wait_until_ready(&prober, &node, &RetryPolicy::default())
            .await
            .expect("node should become ready");

        assert_eq!(prober.probes("coordinator"), 4);
        assert_eq!(start.elapsed(), time::Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_once_the_ceiling_is_reached() {
        let prober = ScriptedProber::default().never_ready("10.0.0.9");
        let node = Node::new("10.0.0.9", 5432);
        let policy = RetryPolicy::default().max_attempts(3);

        match wait_until_ready(&prober, &node, &policy).await {
            Err(ConnectError::NotReady { host, attempts }) => {
                assert_eq!(host, "10.0.0.9");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected NotReady, got {:?}", other),
        }
        assert_eq!(prober.probes("10.0.0.9"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn never_returns_for_a_node_that_never_becomes_ready() {
        let prober = ScriptedProber::default().never_ready("10.0.0.9");
        let node = Node::new("10.0.0.9", 5432);
        let policy = RetryPolicy::default();

        let result = tokio::time::timeout(
            time::Duration::from_secs(3600),
            wait_until_ready(&prober, &node, &policy),
        )
        .await;

        assert!(result.is_err(), "wait_until_ready should still be probing");
        assert!(prober.probes("10.0.0.9") >= 3600);
    }
}
