// [libs/infra/mesh-transport/src/codec.rs]
//! Length-prefixed JSON framing: a 4-byte big-endian length header followed
//! by that many bytes of `serde_json`-encoded [`Envelope`]. Every peer socket
//! in the mesh, and nothing else, speaks this framing.

use crate::error::{Result, TransportError};
use fleetmesh_domain::Envelope;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Hard ceiling on a single frame's declared length. A peer advertising a
/// length beyond this is treated as misbehaving and the connection is
/// dropped before the body is even read, bounding memory use regardless of
/// what the length prefix claims.
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, envelope: &Envelope) -> Result<()> {
    let body = serde_json::to_vec(envelope)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge(body.len(), MAX_FRAME_BYTES));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Envelope> {
    let len = reader.read_u32().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::ConnectionClosed
        } else {
            TransportError::Io(e)
        }
    })? as usize;
    if len > MAX_FRAME_BYTES {
        return Err(TransportError::FrameTooLarge(len, MAX_FRAME_BYTES));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    let envelope = serde_json::from_slice(&body)?;
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetmesh_domain::{MessageKind, NodeId};
    use serde_json::Value;

    #[tokio::test]
    async fn round_trips_an_envelope_over_a_duplex_pipe() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        let env = Envelope::new(MessageKind::Ping, NodeId::new(), 7, Value::Null);
        write_frame(&mut a, &env).await.unwrap();
        let decoded = read_frame(&mut b).await.unwrap();
        assert_eq!(decoded.kind, MessageKind::Ping);
        assert_eq!(decoded.lamport_ts, 7);
    }

    #[tokio::test]
    async fn rejects_a_declared_length_beyond_the_ceiling() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32((MAX_FRAME_BYTES + 1) as u32).await.unwrap();
        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge(_, _)));
    }

    #[tokio::test]
    async fn read_on_a_closed_pipe_reports_connection_closed() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let err = read_frame(&mut b).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }
}
