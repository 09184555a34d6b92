// [libs/infra/mesh-transport/src/listener.rs]
//! Thin wrappers over `TcpListener`/`TcpStream::connect` that hand a freshly
//! accepted or dialed socket straight to [`spawn_connection`]. Everything
//! above this (the HELLO handshake, peer registry bookkeeping) lives in the
//! `apps/peer` binary — this crate only owns the wire.

use crate::connection::{spawn_connection, PeerConnection};
use crate::error::Result;
use fleetmesh_domain::Envelope;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::instrument;

pub struct MeshListener {
    inner: TcpListener,
}

impl MeshListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Accept one inbound connection and spawn its reader/writer tasks.
    /// The caller is responsible for running the HELLO handshake over the
    /// returned channel before registering the peer.
    #[instrument(skip(self))]
    pub async fn accept(&self) -> Result<(PeerConnection, mpsc::UnboundedReceiver<Envelope>, SocketAddr)> {
        let (stream, remote_addr) = self.inner.accept().await?;
        stream.set_nodelay(true).ok();
        let (conn, inbound) = spawn_connection(stream, remote_addr);
        Ok((conn, inbound, remote_addr))
    }
}

#[instrument]
pub async fn dial(addr: SocketAddr) -> Result<(PeerConnection, mpsc::UnboundedReceiver<Envelope>)> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true).ok();
    Ok(spawn_connection(stream, addr))
}
