// [apps/peer/src/mesh/dispatch.rs]
//! Top-level envelope router. One `MeshEngines` is built once in
//! `kernel.rs` and handed to every connection task; it owns the gossip,
//! election, DHT and anti-entropy engines and routes each inbound envelope
//! to whichever one understands its `MessageKind`.

use crate::mesh::anti_entropy::AntiEntropyEngine;
use crate::mesh::dht::DhtEngine;
use crate::mesh::election::ElectionEngine;
use crate::mesh::gossip::GossipEngine;
use crate::state::PeerState;
use fleetmesh_domain::{Envelope, HelloPayload, MessageKind, Peer, PeerRole};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct MeshEngines {
    pub state: PeerState,
    pub gossip: GossipEngine,
    pub election: ElectionEngine,
    pub dht: DhtEngine,
    pub anti_entropy: AntiEntropyEngine,
}

impl MeshEngines {
    pub fn new(state: PeerState) -> Self {
        Self {
            gossip: GossipEngine::new(state.clone()),
            election: ElectionEngine::new(state.clone()),
            dht: DhtEngine::new(state.clone()),
            anti_entropy: AntiEntropyEngine::new(state.clone()),
            state,
        }
    }

    #[instrument(skip(self, envelope), fields(kind = ?envelope.kind, from_addr = %from_addr))]
    pub async fn dispatch(self: &Arc<Self>, envelope: Envelope, from_addr: SocketAddr) {
        let result = match envelope.kind {
            MessageKind::Hello => {
                self.handle_hello(&envelope, from_addr);
                Ok(())
            }
            MessageKind::Ping => {
                self.state.pool.send_to(&from_addr, Envelope::new(MessageKind::Pong, self.state.node_id, envelope.lamport_ts, serde_json::Value::Null)).ok();
                Ok(())
            }
            MessageKind::Pong => Ok(()),
            MessageKind::Pex => {
                self.handle_pex(&envelope);
                Ok(())
            }
            MessageKind::TaskCreate
            | MessageKind::TaskClaim
            | MessageKind::TaskUpdate
            | MessageKind::TaskComplete
            | MessageKind::TaskFail
            | MessageKind::TaskCancel
            | MessageKind::TaskArchive => self.gossip.receive(envelope, from_addr).await,
            MessageKind::AgentRegister | MessageKind::AgentHeartbeat | MessageKind::AgentDeregister => {
                self.gossip.receive(envelope, from_addr).await
            }
            MessageKind::DhtPut | MessageKind::DhtDelete => self.dht.receive(envelope, from_addr).await,
            MessageKind::DhtGet => {
                self.handle_dht_get(&envelope, from_addr).await;
                Ok(())
            }
            MessageKind::DhtGetRsp => Ok(()),
            MessageKind::TaskSyncReq => self.anti_entropy.handle_task_sync_req(&envelope, from_addr).await,
            MessageKind::TaskSyncRsp => self.anti_entropy.handle_task_sync_rsp(&envelope).await,
            MessageKind::AgentSyncReq => self.anti_entropy.handle_agent_sync_req(&envelope, from_addr).await,
            MessageKind::AgentSyncRsp => self.anti_entropy.handle_agent_sync_rsp(&envelope).await,
            MessageKind::DhtSyncReq => self.anti_entropy.handle_dht_sync_req(&envelope, from_addr).await,
            MessageKind::DhtSyncRsp => self.anti_entropy.handle_dht_sync_rsp(&envelope).await,
            MessageKind::EmperorHeartbeat => {
                self.election.on_emperor_heartbeat(&envelope, from_addr.ip()).await;
                Ok(())
            }
            MessageKind::ElectionStart => {
                self.election.on_election_start(&envelope).await;
                Ok(())
            }
            MessageKind::ElectionVictory => {
                self.election.on_election_victory(&envelope, from_addr.ip()).await;
                Ok(())
            }
            MessageKind::CensusRequest => {
                self.handle_census_request().await;
                Ok(())
            }
            other => {
                warn!(kind = ?other, "no handler registered for this message kind yet");
                Ok(())
            }
        };
        if let Err(err) = result {
            warn!(%err, "failed to apply inbound gossip message");
        }
    }

    fn handle_hello(&self, envelope: &Envelope, from_addr: SocketAddr) {
        let payload: HelloPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "malformed hello payload");
                return;
            }
        };
        let peer = Peer::new(payload.node_id, from_addr.ip(), payload.p2p_port, payload.http_port, payload.role);
        let superseded = self.state.registry.write().unwrap().upsert(from_addr, peer);
        if let Some(old_addr) = superseded {
            if old_addr != from_addr {
                self.state.pool.remove(&old_addr);
            }
        }
        info!(node_id = %payload.node_id, %from_addr, "peer said hello");
        self.anti_entropy.trigger_eager_sync(from_addr);
    }

    fn handle_pex(self: &Arc<Self>, envelope: &Envelope) {
        let Some(addrs) = envelope.payload.as_array() else {
            return;
        };
        let known: Vec<SocketAddr> = self.state.registry.read().unwrap().addresses();
        for value in addrs {
            let Some(addr_str) = value.as_str() else { continue };
            let Ok(addr) = addr_str.parse::<SocketAddr>() else { continue };
            if known.contains(&addr) || addr == self.state.config.advertised_p2p_addr() {
                continue;
            }
            crate::mesh::discovery::spawn_dial(self.state.clone(), Arc::clone(self), addr);
        }
    }

    async fn handle_dht_get(&self, envelope: &Envelope, from_addr: SocketAddr) {
        let Some(key) = envelope.payload["key"].as_str() else {
            return;
        };
        let entry = self.dht.get(key).await.ok().flatten();
        let payload = serde_json::json!({ "key": key, "entry": entry });
        let response = Envelope::new(MessageKind::DhtGetRsp, self.state.node_id, self.state.clock.current(), payload);
        self.state.pool.send_to(&from_addr, response).ok();
    }

    async fn handle_census_request(&self) {
        let Ok(mine) = self.state.agents.list_for_node(self.state.node_id.0).await else {
            return;
        };
        for agent in mine {
            if let Err(err) = self.gossip.originate_agent_register(agent).await {
                warn!(%err, "failed to re-announce agent after census request");
            }
        }
    }
}
