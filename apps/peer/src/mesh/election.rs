// [apps/peer/src/mesh/election.rs]
//! Bully-algorithm leader election. The lowest live node-id always wins: a
//! peer receiving any heartbeat or victory announcement from a lower
//! node-id than its current belief adopts it immediately, which is also how
//! two leaders produced by a network partition converge back to one on
//! reunion.

use crate::state::{LeaderInfo, PeerState};
use fleetmesh_domain::{ElectionStartPayload, ElectionVictoryPayload, EmperorHeartbeatPayload, Envelope, MessageKind, NodeId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep};
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct ElectionEngine {
    state: PeerState,
    last_heartbeat_seen: Arc<Mutex<Instant>>,
    epoch: Arc<AtomicU64>,
    heard_lower_this_round: Arc<AtomicBool>,
}

impl ElectionEngine {
    pub fn new(state: PeerState) -> Self {
        Self {
            state,
            last_heartbeat_seen: Arc::new(Mutex::new(Instant::now())),
            epoch: Arc::new(AtomicU64::new(0)),
            heard_lower_this_round: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Adopt `candidate` as leader if it is unknown or has a lower node-id
    /// than the one currently recorded. Steps this peer down from
    /// leadership if it loses the comparison.
    fn consider_leader(&self, candidate: NodeId, host: Option<std::net::IpAddr>, http_port: u16, lamport_ts: i64) {
        let current = self.state.leader.read().unwrap().clone();
        let should_adopt = match current.node_id {
            None => true,
            Some(existing) => candidate < existing,
        };
        if should_adopt {
            info!(%candidate, "adopting new leader");
            self.state.set_leader(LeaderInfo {
                node_id: Some(candidate),
                host,
                http_port: Some(http_port),
                lamport_ts,
            });
        }
    }

    #[instrument(skip(self, envelope))]
    pub async fn on_emperor_heartbeat(&self, envelope: &Envelope, from_host: std::net::IpAddr) {
        let payload: EmperorHeartbeatPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "malformed emperor heartbeat");
                return;
            }
        };
        self.state.clock.witness(envelope.lamport_ts);
        *self.last_heartbeat_seen.lock().await = Instant::now();
        self.consider_leader(payload.node_id, Some(from_host), payload.http_port, payload.lamport_ts);
    }

    #[instrument(skip(self, envelope))]
    pub async fn on_election_start(&self, envelope: &Envelope) {
        let payload: ElectionStartPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "malformed election start");
                return;
            }
        };
        self.state.clock.witness(envelope.lamport_ts);
        if payload.node_id < self.state.node_id {
            self.heard_lower_this_round.store(true, Ordering::SeqCst);
        }
    }

    #[instrument(skip(self, envelope))]
    pub async fn on_election_victory(&self, envelope: &Envelope, from_host: std::net::IpAddr) {
        let payload: ElectionVictoryPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(err) => {
                warn!(%err, "malformed election victory");
                return;
            }
        };
        self.state.clock.witness(envelope.lamport_ts);
        *self.last_heartbeat_seen.lock().await = Instant::now();
        self.consider_leader(payload.node_id, Some(from_host), payload.http_port, payload.lamport_ts);
    }

    async fn start_election(&self) {
        let my_epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.heard_lower_this_round.store(false, Ordering::SeqCst);
        let lamport_ts = self.state.clock.tick();
        info!(epoch = my_epoch, "starting election");
        let payload = ElectionStartPayload {
            node_id: self.state.node_id,
            lamport_ts,
        };
        let envelope = Envelope::new(
            MessageKind::ElectionStart,
            self.state.node_id,
            lamport_ts,
            serde_json::to_value(&payload).expect("election start payload always serialises"),
        );
        self.state.pool.broadcast(envelope, None);

        sleep(self.state.config.election_timeout()).await;

        if self.epoch.load(Ordering::SeqCst) != my_epoch {
            return; // superseded by a fresher election or a victory already settled this round
        }
        if self.heard_lower_this_round.load(Ordering::SeqCst) {
            info!("yielding election to a peer with a lower node-id");
            return;
        }
        self.declare_victory().await;
    }

    async fn declare_victory(&self) {
        let lamport_ts = self.state.clock.tick();
        info!("declaring victory, promoting to leader");
        self.state.set_leader(LeaderInfo {
            node_id: Some(self.state.node_id),
            host: None,
            http_port: Some(self.state.config.http_port),
            lamport_ts,
        });
        let payload = ElectionVictoryPayload {
            node_id: self.state.node_id,
            http_port: self.state.config.http_port,
            lamport_ts,
        };
        let envelope = Envelope::new(
            MessageKind::ElectionVictory,
            self.state.node_id,
            lamport_ts,
            serde_json::to_value(&payload).expect("election victory payload always serialises"),
        );
        self.state.pool.broadcast(envelope, None);

        let census_ts = self.state.clock.tick();
        let census = Envelope::new(MessageKind::CensusRequest, self.state.node_id, census_ts, serde_json::Value::Null);
        self.state.pool.broadcast(census, None);
    }

    pub async fn run_heartbeat_loop(&self) {
        let mut ticker = interval(self.state.config.emperor_heartbeat_interval());
        loop {
            ticker.tick().await;
            if !self.state.is_running() {
                return;
            }
            if !self.state.is_leader() {
                continue;
            }
            let lamport_ts = self.state.clock.tick();
            let payload = EmperorHeartbeatPayload {
                node_id: self.state.node_id,
                http_port: self.state.config.http_port,
                lamport_ts,
            };
            let envelope = match serde_json::to_value(&payload) {
                Ok(v) => Envelope::new(MessageKind::EmperorHeartbeat, self.state.node_id, lamport_ts, v),
                Err(err) => {
                    warn!(%err, "failed to encode emperor heartbeat");
                    continue;
                }
            };
            self.state.pool.broadcast(envelope, None);
        }
    }

    pub async fn run_failure_detector_loop(&self) {
        let mut ticker = interval(self.state.config.emperor_stale_threshold());
        loop {
            ticker.tick().await;
            if !self.state.is_running() {
                return;
            }
            if self.state.is_leader() {
                continue;
            }
            let elapsed = self.last_heartbeat_seen.lock().await.elapsed();
            if elapsed >= self.state.config.emperor_stale_threshold() {
                self.start_election().await;
            }
        }
    }
}
