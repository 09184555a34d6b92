// [apps/peer/src/config.rs]
//! Runtime configuration. Every interval named in the coordination design
//! has a default here; all of them are overridable via environment
//! variable or CLI flag (`clap`'s `env` feature wires both from one
//! declaration).

use clap::Parser;
use fleetmesh_domain::NodeId;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "fleetmesh-peer", about = "Mesh coordination peer")]
pub struct Config {
    /// Address the P2P frame listener binds to.
    #[arg(long, env = "PEER_BIND_ADDR", default_value = "0.0.0.0:7420")]
    pub bind_addr: SocketAddr,

    /// Address this node advertises in HELLO for other peers to dial back.
    #[arg(long, env = "PEER_ADVERTISE_ADDR")]
    pub advertise_addr: Option<SocketAddr>,

    /// HTTP port serving health/status and the task API.
    #[arg(long, env = "PEER_HTTP_PORT", default_value_t = 8420)]
    pub http_port: u16,

    /// Comma-separated `host:port` seed list dialed on startup.
    #[arg(long, env = "PEER_SEEDS", value_delimiter = ',', default_value = "")]
    pub seeds: Vec<SocketAddr>,

    /// UDP port for beacon discovery. Set to 0 to disable beaconing.
    #[arg(long, env = "PEER_BEACON_PORT", default_value_t = 7421)]
    pub beacon_port: u16,

    /// IPv4 multicast group used for beacon discovery.
    #[arg(long, env = "PEER_MULTICAST_GROUP", default_value = "239.192.42.42")]
    pub multicast_group: String,

    /// libSQL connection URL (`:memory:`, `file:path.db`, or a remote URL).
    #[arg(long, env = "DATABASE_URL", default_value = "file:fleetmesh.db")]
    pub database_url: String,

    #[arg(skip)]
    pub node_id: Option<NodeId>,

    #[arg(long, env = "AGENT_HEARTBEAT_INTERVAL_SECS", default_value_t = 15)]
    pub agent_heartbeat_interval_secs: u64,
    #[arg(long, env = "AGENT_OFFLINE_THRESHOLD_SECS", default_value_t = 45)]
    pub agent_offline_threshold_secs: u64,
    #[arg(long, env = "AGENT_STARTUP_GRACE_SECS", default_value_t = 10)]
    pub agent_startup_grace_secs: u64,

    #[arg(long, env = "EMPEROR_HEARTBEAT_INTERVAL_SECS", default_value_t = 10)]
    pub emperor_heartbeat_interval_secs: u64,
    #[arg(long, env = "ELECTION_TIMEOUT_SECS", default_value_t = 5)]
    pub election_timeout_secs: u64,
    #[arg(long, env = "EMPEROR_STALE_THRESHOLD_SECS", default_value_t = 30)]
    pub emperor_stale_threshold_secs: u64,

    #[arg(long, env = "ANTI_ENTROPY_INTERVAL_SECS", default_value_t = 60)]
    pub anti_entropy_interval_secs: u64,
    #[arg(long, env = "ANTI_ENTROPY_AGENT_INTERVAL_SECS", default_value_t = 30)]
    pub anti_entropy_agent_interval_secs: u64,
    #[arg(long, env = "ANTI_ENTROPY_DHT_INTERVAL_SECS", default_value_t = 45)]
    pub anti_entropy_dht_interval_secs: u64,
    #[arg(long, env = "CLOCK_PERSIST_INTERVAL_SECS", default_value_t = 30)]
    pub clock_persist_interval_secs: u64,

    #[arg(long, env = "PING_TIMEOUT_SECS", default_value_t = 5)]
    pub ping_timeout_secs: u64,
    #[arg(long, env = "DEGRADED_RESPONSE_MS", default_value_t = 2000)]
    pub degraded_response_ms: u64,

    #[arg(long, env = "TOMBSTONE_TTL_SECS", default_value_t = 120)]
    pub tombstone_ttl_secs: i64,
    #[arg(long, env = "DHT_PURGE_INTERVAL_SECS", default_value_t = 120)]
    pub dht_purge_interval_secs: u64,
    #[arg(long, env = "DHT_TOMBSTONE_GRACE_SECS", default_value_t = 300)]
    pub dht_tombstone_grace_secs: i64,

    #[arg(long, env = "SEEN_SET_CAPACITY", default_value_t = 10_000)]
    pub seen_set_capacity: usize,

    /// Beacon broadcast cadence. Not individually named in the external
    /// config catalogue; tied to PEX for simplicity.
    #[arg(long, env = "PEX_INTERVAL_SECS", default_value_t = 20)]
    pub pex_interval_secs: u64,
}

impl Config {
    pub fn agent_heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.agent_heartbeat_interval_secs)
    }
    pub fn emperor_heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.emperor_heartbeat_interval_secs)
    }
    pub fn election_timeout(&self) -> Duration {
        Duration::from_secs(self.election_timeout_secs)
    }
    pub fn emperor_stale_threshold(&self) -> Duration {
        Duration::from_secs(self.emperor_stale_threshold_secs)
    }
    pub fn anti_entropy_interval(&self) -> Duration {
        Duration::from_secs(self.anti_entropy_interval_secs)
    }
    pub fn anti_entropy_agent_interval(&self) -> Duration {
        Duration::from_secs(self.anti_entropy_agent_interval_secs)
    }
    pub fn anti_entropy_dht_interval(&self) -> Duration {
        Duration::from_secs(self.anti_entropy_dht_interval_secs)
    }
    pub fn clock_persist_interval(&self) -> Duration {
        Duration::from_secs(self.clock_persist_interval_secs)
    }
    pub fn dht_purge_interval(&self) -> Duration {
        Duration::from_secs(self.dht_purge_interval_secs)
    }
    pub fn pex_interval(&self) -> Duration {
        Duration::from_secs(self.pex_interval_secs)
    }

    pub fn advertised_p2p_addr(&self) -> SocketAddr {
        self.advertise_addr.unwrap_or(self.bind_addr)
    }
}
