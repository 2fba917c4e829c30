use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use tracing::info;

use crate::error::StoreError;
use crate::node::Node;

/// Membership operations against the Citus coordinator. Every call is a standalone,
/// immediately committed statement (or two, for removal).
#[async_trait]
pub trait MembershipStore: Send {
    /// Host names of the workers the coordinator currently considers active.
    async fn list_active_workers(&mut self) -> Result<BTreeSet<String>, StoreError>;

    async fn add_worker(&mut self, node: &Node) -> Result<(), StoreError>;

    /// Drop the node's shard placements, then remove it from the cluster.
    async fn remove_worker(&mut self, node: &Node) -> Result<(), StoreError>;

    async fn rebalance_shards(&mut self) -> Result<(), StoreError>;
}

/// The coordinator session. Owns the single connection used for the life of the process.
pub struct CitusStore {
    conn: PgConnection,
}

impl CitusStore {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl MembershipStore for CitusStore {
    async fn list_active_workers(&mut self) -> Result<BTreeSet<String>, StoreError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT node_name::text FROM citus_get_active_worker_nodes()")
                .fetch_all(&mut self.conn)
                .await?;

        Ok(names.into_iter().collect())
    }

    async fn add_worker(&mut self, node: &Node) -> Result<(), StoreError> {
        info!("adding {} node", node.host);

        sqlx::query("SELECT citus_add_node($1, $2)")
            .bind(&node.host)
            .bind(i32::from(node.port))
            .execute(&mut self.conn)
            .await?;

        Ok(())
    }

    async fn remove_worker(&mut self, node: &Node) -> Result<(), StoreError> {
        info!("removing {} node", node.host);

        // Citus refuses to remove a node that still has placements.
        sqlx::query(
            r#"
DELETE FROM pg_dist_placement
WHERE groupid = (
    SELECT groupid FROM pg_dist_node
    WHERE nodename = $1 AND nodeport = $2
    LIMIT 1
)
            "#,
        )
        .bind(&node.host)
        .bind(i32::from(node.port))
        .execute(&mut self.conn)
        .await?;

        sqlx::query("SELECT citus_remove_node($1, $2)")
            .bind(&node.host)
            .bind(i32::from(node.port))
            .execute(&mut self.conn)
            .await?;

        Ok(())
    }

    async fn rebalance_shards(&mut self) -> Result<(), StoreError> {
        info!("rebalancing shards");

        sqlx::query("SELECT rebalance_table_shards()")
            .execute(&mut self.conn)
            .await?;

        Ok(())
    }
}
