//! Length-prefixed JSON framing and connection management for the mesh's
//! peer-to-peer socket plane. This crate knows nothing about HELLO
//! handshakes, gossip, or elections — it only moves [`fleetmesh_domain::Envelope`]
//! values across TCP sockets reliably and with a bounded frame size.

pub mod codec;
pub mod connection;
pub mod error;
pub mod listener;
pub mod pool;

pub use codec::{read_frame, write_frame, MAX_FRAME_BYTES};
pub use connection::{spawn_connection, PeerConnection};
pub use error::{Result, TransportError};
pub use listener::{dial, MeshListener};
pub use pool::ConnectionPool;
