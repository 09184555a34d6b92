// [apps/peer/src/mesh/discovery.rs]
//! Three idempotent ways of finding peers: a UDP beacon, a configured seed
//! list dialed with backoff, and periodic peer-exchange over already-open
//! connections. All three funnel into the same dial path so the registry's
//! node-id uniqueness check is the single place duplicates get resolved.

use crate::mesh::dispatch::MeshEngines;
use crate::state::PeerState;
use fleetmesh_domain::{Envelope, HelloPayload, MessageKind};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Serialize, Deserialize)]
struct BeaconPayload {
    node_id: fleetmesh_domain::NodeId,
    p2p_port: u16,
    role: fleetmesh_domain::PeerRole,
}

/// Dial `addr` in its own task and, once connected, hand the connection off
/// to [`crate::mesh::handshake::handle_connection`]. Fire-and-forget: the
/// registry's `contains_node` check (performed inside the handshake once the
/// remote's HELLO arrives) is what actually suppresses a redundant dial.
pub fn spawn_dial(state: PeerState, engines: Arc<MeshEngines>, addr: SocketAddr) {
    tokio::spawn(async move {
        if state.pool.contains(&addr) {
            return;
        }
        match fleetmesh_transport::dial(addr).await {
            Ok((conn, inbound)) => {
                crate::mesh::handshake::run(state, engines, conn, inbound, addr, true).await;
            }
            Err(err) => debug!(%addr, %err, "dial failed"),
        }
    });
}

#[instrument(skip(state, engines))]
pub async fn run_seed_dial_loop(state: PeerState, engines: Arc<MeshEngines>) {
    for seed in state.config.seeds.clone() {
        spawn_dial(state.clone(), engines.clone(), seed);
    }

    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(60);
    loop {
        sleep(backoff).await;
        if !state.is_running() {
            return;
        }
        let missing: Vec<SocketAddr> = state
            .config
            .seeds
            .iter()
            .copied()
            .filter(|addr| !state.pool.contains(addr))
            .collect();
        if missing.is_empty() {
            backoff = Duration::from_secs(2);
            continue;
        }
        for addr in missing {
            spawn_dial(state.clone(), engines.clone(), addr);
        }
        backoff = (backoff * 2).min(max_backoff);
    }
}

#[instrument(skip(state, engines))]
pub async fn run_beacon_loop(state: PeerState, engines: Arc<MeshEngines>) {
    if state.config.beacon_port == 0 {
        info!("beacon discovery disabled (beacon_port=0)");
        return;
    }
    let socket = match UdpSocket::bind(("0.0.0.0", state.config.beacon_port)).await {
        Ok(s) => s,
        Err(err) => {
            warn!(%err, "failed to bind beacon socket, discovery beacon disabled");
            return;
        }
    };
    if let Err(err) = socket.set_broadcast(true) {
        warn!(%err, "failed to enable udp broadcast");
    }
    if let Ok(group) = state.config.multicast_group.parse::<std::net::Ipv4Addr>() {
        if let Err(err) = socket.join_multicast_v4(group, std::net::Ipv4Addr::UNSPECIFIED) {
            warn!(%err, %group, "failed to join beacon multicast group");
        }
    }

    let socket = Arc::new(socket);
    tokio::spawn(send_beacons(state.clone(), socket.clone()));
    receive_beacons(state, engines, socket).await;
}

async fn send_beacons(state: PeerState, socket: Arc<UdpSocket>) {
    let mut ticker = interval(state.config.pex_interval());
    let broadcast_addr: SocketAddr = format!("255.255.255.255:{}", state.config.beacon_port).parse().unwrap();
    let multicast_addr: SocketAddr = format!("{}:{}", state.config.multicast_group, state.config.beacon_port)
        .parse()
        .unwrap();
    loop {
        ticker.tick().await;
        if !state.is_running() {
            return;
        }
        let payload = BeaconPayload {
            node_id: state.node_id,
            p2p_port: state.config.advertised_p2p_addr().port(),
            role: if state.is_leader() {
                fleetmesh_domain::PeerRole::Leader
            } else {
                fleetmesh_domain::PeerRole::Worker
            },
        };
        let Ok(bytes) = serde_json::to_vec(&payload) else { continue };
        socket.send_to(&bytes, broadcast_addr).await.ok();
        socket.send_to(&bytes, multicast_addr).await.ok();
    }
}

async fn receive_beacons(state: PeerState, engines: Arc<MeshEngines>, socket: Arc<UdpSocket>) {
    let mut buf = vec![0u8; 2048];
    loop {
        if !state.is_running() {
            return;
        }
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "beacon socket read failed");
                continue;
            }
        };
        let Ok(payload) = serde_json::from_slice::<BeaconPayload>(&buf[..len]) else {
            continue;
        };
        if payload.node_id == state.node_id {
            continue;
        }
        if state.registry.read().unwrap().contains_node(&payload.node_id) {
            continue;
        }
        let dial_addr = SocketAddr::new(from.ip(), payload.p2p_port);
        spawn_dial(state.clone(), engines.clone(), dial_addr);
    }
}

#[instrument(skip(state))]
pub async fn run_pex_loop(state: PeerState) {
    let mut ticker = interval(state.config.pex_interval());
    loop {
        ticker.tick().await;
        if !state.is_running() {
            return;
        }
        let sample = state.registry.read().unwrap().random_sample(5);
        if sample.is_empty() {
            continue;
        }
        let addrs: Vec<String> = sample.iter().map(SocketAddr::to_string).collect();
        let lamport_ts = state.clock.current();
        let envelope = Envelope::new(MessageKind::Pex, state.node_id, lamport_ts, serde_json::json!(addrs));
        state.pool.broadcast(envelope, None);
    }
}

/// Send our own HELLO as the first frame on a freshly connected socket.
pub fn hello_envelope(state: &PeerState) -> Envelope {
    let role = if state.is_leader() {
        fleetmesh_domain::PeerRole::Leader
    } else {
        fleetmesh_domain::PeerRole::Worker
    };
    let payload = HelloPayload {
        node_id: state.node_id,
        p2p_port: state.config.advertised_p2p_addr().port(),
        http_port: state.config.http_port,
        role,
    };
    Envelope::new(
        MessageKind::Hello,
        state.node_id,
        state.clock.current(),
        serde_json::to_value(&payload).expect("hello payload always serialises"),
    )
}
