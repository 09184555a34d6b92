// [apps/gateway/src/config.rs]
//! Runtime configuration for the gateway. Mirrors `apps/peer`'s config
//! style: every tunable is a `clap` field overridable via environment
//! variable or flag.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "fleetmesh-gateway", about = "Stable client-facing proxy to the mesh's current leader")]
pub struct Config {
    /// Address the client-facing HTTP/WebSocket listener binds to.
    #[arg(long, env = "GATEWAY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: SocketAddr,

    /// Comma-separated `host:port` mesh peers the gateway joins as a
    /// passive observer to learn who the current leader is.
    #[arg(long, env = "GATEWAY_MESH_SEEDS", value_delimiter = ',')]
    pub mesh_seeds: Vec<SocketAddr>,

    /// Per-request upstream timeout when forwarding to the leader.
    #[arg(long, env = "GATEWAY_UPSTREAM_TIMEOUT_SECS", default_value_t = 30)]
    pub upstream_timeout_secs: u64,
}

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}
