// [libs/infra/mesh-transport/src/connection.rs]
//! A single peer-to-peer socket, split into an outbound writer task and an
//! inbound frame stream. Callers never touch the raw `TcpStream` again once
//! [`spawn_connection`] returns — everything flows through channels so a
//! slow or wedged remote peer can't block the caller's own event loop.

use crate::codec::{read_frame, write_frame};
use fleetmesh_domain::Envelope;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// The caller's handle to a live connection: an outbound sender and the
/// connection's remote address. Dropping the sender's last clone causes the
/// writer task to exit and the socket to close.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    pub remote_addr: SocketAddr,
    pub(crate) outbound: mpsc::UnboundedSender<Envelope>,
}

impl PeerConnection {
    pub fn send(&self, envelope: Envelope) -> bool {
        self.outbound.send(envelope).is_ok()
    }

    #[cfg(test)]
    pub(crate) fn for_test(remote_addr: SocketAddr, outbound: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { remote_addr, outbound }
    }
}

/// Split a connected `TcpStream` into reader/writer tasks and return a
/// [`PeerConnection`] handle plus a channel of frames received from the
/// remote side. The reader task exits (dropping the inbound sender, which
/// closes `inbound_rx`) as soon as the peer disconnects or sends a malformed
/// frame; the writer task exits when the handle (and all its clones) are
/// dropped.
#[instrument(skip(stream), fields(remote = %remote_addr))]
pub fn spawn_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
) -> (PeerConnection, mpsc::UnboundedReceiver<Envelope>) {
    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    tokio::spawn(writer_loop(write_half, outbound_rx, remote_addr));
    tokio::spawn(reader_loop(read_half, inbound_tx, remote_addr));

    (
        PeerConnection {
            remote_addr,
            outbound: outbound_tx,
        },
        inbound_rx,
    )
}

async fn writer_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound_rx: mpsc::UnboundedReceiver<Envelope>,
    remote_addr: SocketAddr,
) {
    while let Some(envelope) = outbound_rx.recv().await {
        if let Err(err) = write_frame(&mut writer, &envelope).await {
            warn!(%remote_addr, %err, "dropping connection: write failed");
            return;
        }
    }
    debug!(%remote_addr, "writer task exiting: sender dropped");
}

async fn reader_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    remote_addr: SocketAddr,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(envelope) => {
                if inbound_tx.send(envelope).is_err() {
                    return;
                }
            }
            Err(err) => {
                debug!(%remote_addr, %err, "connection closed");
                return;
            }
        }
    }
}
