// [libs/infra/mesh-store/src/repositories/dht.rs]
use crate::client::MeshStoreClient;
use crate::errors::{Result, StoreError};
use fleetmesh_domain::DhtEntry;
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

pub struct DhtRepository {
    client: MeshStoreClient,
}

impl DhtRepository {
    pub fn new(client: MeshStoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, entry), fields(key = %entry.key, lamport_ts = entry.lamport_ts))]
    pub async fn put(&self, entry: &DhtEntry) -> Result<bool> {
        let conn = self.client.connection()?;
        conn.execute(
            r#"
            INSERT INTO dht_entries (
                key, value, content_hash, origin_node, lamport_ts,
                replica_count, ttl_secs, tombstone, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                content_hash = excluded.content_hash,
                lamport_ts = excluded.lamport_ts,
                replica_count = excluded.replica_count,
                ttl_secs = excluded.ttl_secs,
                tombstone = excluded.tombstone,
                updated_at = excluded.updated_at
            WHERE excluded.lamport_ts > dht_entries.lamport_ts
            "#,
            params![
                entry.key.clone(),
                entry.value.clone(),
                entry.content_hash.clone(),
                entry.origin_node.to_string(),
                entry.lamport_ts,
                entry.replica_count,
                entry.ttl_secs as i64,
                entry.tombstone as i64,
                entry.created_at.to_rfc3339(),
                entry.updated_at.to_rfc3339(),
            ],
        )
        .await?;
        Ok(conn.changes() > 0)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<DhtEntry>> {
        let conn = self.client.connection()?;
        let mut rows = conn.query("SELECT * FROM dht_entries WHERE key = ?1", params![key]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_since(&self, lamport_ts: i64) -> Result<Vec<DhtEntry>> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT * FROM dht_entries WHERE lamport_ts > ?1 ORDER BY lamport_ts ASC",
                params![lamport_ts],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_entry(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn max_lamport_ts(&self) -> Result<i64> {
        let conn = self.client.connection()?;
        let mut rows = conn.query("SELECT COALESCE(MAX(lamport_ts), 0) FROM dht_entries", ()).await?;
        let row = rows.next().await?.ok_or_else(|| StoreError::MappingError("missing aggregate row".into()))?;
        row.get(0).map_err(|e| StoreError::MappingError(e.to_string()))
    }

    /// Hard-delete tombstones past the configured grace period; garbage
    /// collection for the DHT runs on the interval described in the
    /// coordination layer's configuration, not in this repository.
    #[instrument(skip(self))]
    pub async fn purge_expired_tombstones(&self, grace_secs: i64) -> Result<usize> {
        let conn = self.client.connection()?;
        conn.execute(
            r#"
            DELETE FROM dht_entries
            WHERE tombstone = 1
              AND (unixepoch('now') - unixepoch(updated_at)) >= ?1
            "#,
            params![grace_secs],
        )
        .await?;
        Ok(conn.changes() as usize)
    }
}

fn row_to_entry(row: &Row) -> Result<DhtEntry> {
    let map_err = |e: libsql::Error| StoreError::MappingError(e.to_string());

    let key: String = row.get(0).map_err(map_err)?;
    let value: Vec<u8> = row.get(1).map_err(map_err)?;
    let content_hash: String = row.get(2).map_err(map_err)?;
    let origin_node: String = row.get(3).map_err(map_err)?;
    let lamport_ts: i64 = row.get(4).map_err(map_err)?;
    let replica_count: i64 = row.get(5).map_err(map_err)?;
    let ttl_secs: i64 = row.get(6).map_err(map_err)?;
    let tombstone: i64 = row.get(7).map_err(map_err)?;
    let created_at: String = row.get(8).map_err(map_err)?;
    let updated_at: String = row.get(9).map_err(map_err)?;

    Ok(DhtEntry {
        key,
        value,
        content_hash,
        origin_node: Uuid::parse_str(&origin_node).map_err(|e| StoreError::MappingError(e.to_string()))?,
        lamport_ts,
        replica_count: replica_count as u32,
        ttl_secs: ttl_secs as u64,
        tombstone: tombstone != 0,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn parse_ts(s: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::MappingError(e.to_string()))
}
