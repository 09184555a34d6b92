// [apps/peer/src/bootstrap.rs]
//! Everything that has to happen before the mesh can accept a connection:
//! open the store, recover this node's identity and logical clock from
//! whatever was last persisted, and hand back a ready `PeerState`.

use crate::config::Config;
use crate::state::PeerState;
use anyhow::{Context, Result};
use fleetmesh_domain::{LamportClock, NodeId};
use fleetmesh_store::repositories::state::{KEY_LAMPORT_CLOCK, KEY_NODE_ID};
use fleetmesh_store::{MeshStoreClient, StateRepository};
use std::sync::Arc;
use tracing::info;

pub async fn bootstrap(config: Config) -> Result<PeerState> {
    let store = MeshStoreClient::connect(&config.database_url)
        .await
        .context("opening mesh store")?;
    let kv = StateRepository::new(store.clone());

    let node_id = recover_node_id(&kv).await?;
    let clock = recover_clock(&kv).await?;

    info!(%node_id, lamport_ts = clock.current(), "peer identity recovered");

    Ok(PeerState::new(Arc::new(config), node_id, clock, store))
}

async fn recover_node_id(kv: &StateRepository) -> Result<NodeId> {
    match kv.get(KEY_NODE_ID).await? {
        Some(raw) => raw.parse().context("stored node_id is not a valid uuid"),
        None => {
            let node_id = NodeId::new();
            kv.set(KEY_NODE_ID, &node_id.to_string()).await?;
            info!(%node_id, "generated new node identity");
            Ok(node_id)
        }
    }
}

async fn recover_clock(kv: &StateRepository) -> Result<LamportClock> {
    match kv.get_i64(KEY_LAMPORT_CLOCK).await? {
        Some(value) => Ok(LamportClock::restore(value)),
        None => Ok(LamportClock::new()),
    }
}
