// [libs/infra/mesh-transport/src/error.rs]
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame of {0} bytes exceeds the {1} byte ceiling")]
    FrameTooLarge(usize, usize),

    #[error("peer closed the connection")]
    ConnectionClosed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed envelope: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("no connection to {0}")]
    NoSuchPeer(std::net::SocketAddr),
}

pub type Result<T> = std::result::Result<T, TransportError>;
