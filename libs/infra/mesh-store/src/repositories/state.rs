// [libs/infra/mesh-store/src/repositories/state.rs]
//! Flat key/value store for small singleton facts: the persisted Lamport
//! clock value and the node's own identity, read back on restart.

use crate::client::MeshStoreClient;
use crate::errors::Result;
use libsql::params;
use tracing::instrument;

pub struct StateRepository {
    client: MeshStoreClient,
}

impl StateRepository {
    pub fn new(client: MeshStoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.client.connection()?;
        let mut rows = conn.query("SELECT value FROM state WHERE key = ?1", params![key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.client.connection()?;
        conn.execute(
            r#"
            INSERT INTO state (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
            params![key, value],
        )
        .await?;
        Ok(())
    }

    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get(key).await?.and_then(|v| v.parse().ok()))
    }

    pub async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set(key, &value.to_string()).await
    }
}

pub const KEY_LAMPORT_CLOCK: &str = "lamport_clock";
pub const KEY_NODE_ID: &str = "node_id";
