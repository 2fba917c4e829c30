use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tracing::info;

use crate::error::ConnectError;
use crate::node::Node;
use crate::readiness::{wait_until_ready, Credentials, ReadinessProber, RetryPolicy};

/// Open the coordinator session once the coordinator accepts connections.
///
/// The coordinator is usually started right before us and may take a while to accept
/// connections, so readiness is probed first according to `policy`. Any error opening
/// the real session afterwards is returned as is: only "not ready yet" is retried.
///
/// Statements on the returned connection run outside of any transaction, so each one
/// is committed as soon as it completes.
pub async fn connect_to_coordinator<P>(
    prober: &P,
    credentials: &Credentials,
    coordinator: &Node,
    policy: &RetryPolicy,
) -> Result<PgConnection, ConnectError>
where
    P: ReadinessProber + ?Sized,
{
    info!("connecting to coordinator at {}", coordinator);

    wait_until_ready(prober, coordinator, policy).await?;

    let conn = PgConnection::connect_with(&credentials.connect_options(coordinator)).await?;

    info!("connected to {}", coordinator.host);

    Ok(conn)
}
