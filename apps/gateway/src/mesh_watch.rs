// [apps/gateway/src/mesh_watch.rs]
//! Joins the mesh as a passive, non-voting observer: dials every configured
//! seed, sends a `HELLO` tagging itself `role=gateway`, and folds every
//! `HELLO`/`EMPEROR_HEARTBEAT`/`ELECTION_VICTORY` it receives into the
//! gateway's single leader variable. Never originates gossip, never joins
//! an election, never forwards anything it receives.

use crate::state::GatewayState;
use fleetmesh_domain::{
    ElectionVictoryPayload, EmperorHeartbeatPayload, Envelope, HelloPayload, MessageKind, PeerRole,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

#[instrument(skip(state))]
pub async fn run(state: GatewayState) {
    let mut handles = Vec::new();
    for seed in state.config.mesh_seeds.clone() {
        handles.push(tokio::spawn(watch_seed(state.clone(), seed)));
    }
    for handle in handles {
        handle.await.ok();
    }
}

async fn watch_seed(state: GatewayState, addr: SocketAddr) {
    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(60);

    while state.is_running() {
        match fleetmesh_transport::dial(addr).await {
            Ok((conn, inbound)) => {
                backoff = Duration::from_secs(2);
                conn.send(hello_envelope(&state));
                info!(%addr, "watching mesh peer for leader updates");
                pump(&state, inbound, addr).await;
                info!(%addr, "lost connection to mesh peer, will retry");
            }
            Err(err) => {
                debug!(%addr, %err, "dial failed, retrying with backoff");
            }
        }
        if !state.is_running() {
            return;
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

async fn pump(state: &GatewayState, mut inbound: mpsc::UnboundedReceiver<Envelope>, addr: SocketAddr) {
    while let Some(envelope) = inbound.recv().await {
        if !state.is_running() {
            return;
        }
        handle_envelope(state, envelope, addr);
    }
}

/// `addr` is the socket the gateway itself dialed to reach this peer, so
/// every envelope arriving on this connection genuinely originates there —
/// election and heartbeat messages are never forwarded by the mesh, only
/// ever sent directly by the peer that raised them.
fn handle_envelope(state: &GatewayState, envelope: Envelope, addr: SocketAddr) {
    match envelope.kind {
        MessageKind::Hello => {
            let Ok(payload) = serde_json::from_value::<HelloPayload>(envelope.payload) else {
                return;
            };
            if payload.role == PeerRole::Leader {
                state.consider_leader(payload.node_id, addr.ip(), payload.http_port, 0);
            }
        }
        MessageKind::EmperorHeartbeat => {
            let Ok(payload) = serde_json::from_value::<EmperorHeartbeatPayload>(envelope.payload) else {
                return;
            };
            state.consider_leader(payload.node_id, addr.ip(), payload.http_port, payload.lamport_ts);
        }
        MessageKind::ElectionVictory => {
            let Ok(payload) = serde_json::from_value::<ElectionVictoryPayload>(envelope.payload) else {
                return;
            };
            state.consider_leader(payload.node_id, addr.ip(), payload.http_port, payload.lamport_ts);
            state.close_all_upstream_sockets();
        }
        other => {
            warn!(kind = ?other, "gateway ignores this message kind");
        }
    }
}

fn hello_envelope(state: &GatewayState) -> Envelope {
    let payload = HelloPayload {
        node_id: state.node_id,
        p2p_port: 0,
        http_port: state.config.bind_addr.port(),
        role: PeerRole::Gateway,
    };
    Envelope::new(
        MessageKind::Hello,
        state.node_id,
        0,
        serde_json::to_value(&payload).expect("hello payload always serialises"),
    )
}
