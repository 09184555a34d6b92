// [apps/peer/src/mesh/dht.rs]
//! Content-addressed key/value store spanning the mesh. `DhtRepository`
//! already gives last-writer-wins persistence and tombstone sweeping; this
//! engine adds gossip origination/reception and the periodic GC loop on top
//! of it.

use crate::state::PeerState;
use anyhow::{Context, Result};
use fleetmesh_domain::{DhtEntry, DhtPutPayload, Envelope, MessageKind};
use tokio::time::interval;
use tracing::{info, instrument, warn};

pub struct DhtEngine {
    state: PeerState,
}

impl DhtEngine {
    pub fn new(state: PeerState) -> Self {
        Self { state }
    }

    #[instrument(skip(self, key, value))]
    pub async fn put_named(&self, key: impl Into<String>, value: Vec<u8>, replica_count: u32, ttl_secs: u64) -> Result<DhtEntry> {
        let lamport_ts = self.state.clock.tick();
        let entry = DhtEntry::put_named(key, value, self.state.node_id.0, replica_count, ttl_secs, lamport_ts);
        self.persist_and_broadcast(entry).await
    }

    #[instrument(skip(self, value))]
    pub async fn put_content_addressed(&self, value: Vec<u8>, replica_count: u32, ttl_secs: u64) -> Result<DhtEntry> {
        let lamport_ts = self.state.clock.tick();
        let entry = DhtEntry::put_content_addressed(value, self.state.node_id.0, replica_count, ttl_secs, lamport_ts);
        self.persist_and_broadcast(entry).await
    }

    async fn persist_and_broadcast(&self, entry: DhtEntry) -> Result<DhtEntry> {
        self.state.dht.put(&entry).await.context("persisting dht entry")?;
        let key = format!("dht:{}:{:?}:{}", entry.key, MessageKind::DhtPut, entry.lamport_ts);
        self.state.seen.lock().unwrap().check_and_insert(&key);
        let payload = DhtPutPayload {
            key: entry.key.clone(),
            value: entry.value.clone(),
            content_hash: entry.content_hash.clone(),
            replica_count: entry.replica_count,
            ttl_secs: entry.ttl_secs,
        };
        let envelope = Envelope::new(MessageKind::DhtPut, self.state.node_id, entry.lamport_ts, serde_json::to_value(&payload)?);
        self.state.pool.broadcast(envelope, None);
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<DhtEntry>> {
        match self.state.dht.get(key).await? {
            Some(entry) if entry.tombstone || entry.is_ttl_expired() => Ok(None),
            other => Ok(other),
        }
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<Option<DhtEntry>> {
        let Some(current) = self.state.dht.get(key).await? else {
            return Ok(None);
        };
        let lamport_ts = self.state.clock.tick();
        let tomb = current.tombstoned(lamport_ts);
        self.state.dht.put(&tomb).await.context("persisting dht tombstone")?;
        let dedup_key = format!("dht:{}:{:?}:{}", tomb.key, MessageKind::DhtDelete, lamport_ts);
        self.state.seen.lock().unwrap().check_and_insert(&dedup_key);
        let envelope = Envelope::new(
            MessageKind::DhtDelete,
            self.state.node_id,
            lamport_ts,
            serde_json::json!({ "key": tomb.key }),
        );
        self.state.pool.broadcast(envelope, None);
        Ok(Some(tomb))
    }

    #[instrument(skip(self, envelope), fields(kind = ?envelope.kind))]
    pub async fn receive(&self, envelope: Envelope, from_addr: std::net::SocketAddr) -> Result<()> {
        match envelope.kind {
            MessageKind::DhtPut => {
                let payload: DhtPutPayload = serde_json::from_value(envelope.payload.clone())?;
                let entry = DhtEntry {
                    key: payload.key.clone(),
                    value: payload.value,
                    content_hash: payload.content_hash,
                    origin_node: envelope.from.0,
                    lamport_ts: envelope.lamport_ts,
                    replica_count: payload.replica_count,
                    ttl_secs: payload.ttl_secs,
                    created_at: chrono::Utc::now(),
                    updated_at: chrono::Utc::now(),
                    tombstone: false,
                };
                if !entry.verify_integrity() {
                    warn!(key = %entry.key, "rejecting dht put with mismatched content hash");
                    return Ok(());
                }
                self.state.dht.put(&entry).await?;
            }
            MessageKind::DhtDelete => {
                let key = envelope.payload["key"].as_str().unwrap_or_default();
                if let Some(current) = self.state.dht.get(key).await? {
                    self.state.dht.put(&current.tombstoned(envelope.lamport_ts)).await?;
                }
            }
            other => {
                warn!(kind = ?other, "dht engine received an unexpected message kind");
                return Ok(());
            }
        }
        self.state.pool.broadcast(envelope, Some(from_addr));
        Ok(())
    }

    /// Apply an entry learned from an anti-entropy sync response. Relies on
    /// the repository's last-writer-wins compare-and-set; skips the
    /// integrity check for tombstones, same as the gossip path.
    pub async fn sync_apply(&self, entry: DhtEntry) -> Result<()> {
        if !entry.verify_integrity() {
            warn!(key = %entry.key, "dropping sync entry with mismatched content hash");
            return Ok(());
        }
        self.state.dht.put(&entry).await?;
        Ok(())
    }

    pub async fn run_gc_loop(&self) {
        let mut ticker = interval(self.state.config.dht_purge_interval());
        loop {
            ticker.tick().await;
            if !self.state.is_running() {
                return;
            }
            match self.state.dht.purge_expired_tombstones(self.state.config.dht_tombstone_grace_secs).await {
                Ok(0) => {}
                Ok(n) => info!(purged = n, "swept expired dht tombstones"),
                Err(err) => warn!(%err, "dht tombstone sweep failed"),
            }
        }
    }
}
