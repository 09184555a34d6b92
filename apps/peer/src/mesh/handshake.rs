// [apps/peer/src/mesh/handshake.rs]
//! Per-connection lifecycle: send our HELLO, register the remote's once it
//! arrives, pump inbound frames into the dispatcher, and clean up the
//! registry/pool on disconnect. One of these runs per accepted or dialed
//! socket for as long as that socket lives.

use crate::mesh::discovery::hello_envelope;
use crate::mesh::dispatch::MeshEngines;
use crate::state::PeerState;
use fleetmesh_domain::Envelope;
use fleetmesh_transport::PeerConnection;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

#[instrument(skip(state, engines, conn, inbound), fields(%addr, we_dialed))]
pub async fn run(
    state: PeerState,
    engines: Arc<MeshEngines>,
    conn: PeerConnection,
    mut inbound: mpsc::UnboundedReceiver<Envelope>,
    addr: SocketAddr,
    we_dialed: bool,
) {
    conn.send(hello_envelope(&state));
    state.pool.insert(conn);
    debug!("connection established, awaiting inbound frames");

    while let Some(envelope) = inbound.recv().await {
        if !state.is_running() {
            break;
        }
        engines.dispatch(envelope, addr).await;
    }

    state.pool.remove(&addr);
    if let Some(peer) = state.registry.write().unwrap().remove_by_addr(&addr) {
        info!(node_id = %peer.node_id, %addr, "peer disconnected");
    }
}
