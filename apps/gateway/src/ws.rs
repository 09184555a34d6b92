// [apps/gateway/src/ws.rs]
//! WebSocket proxy: on `open`, dials an upstream WebSocket to the current
//! leader and pumps frames bidirectionally on a dedicated task. The pump
//! selects on a cancellation token so `ELECTION_VICTORY` can force-close
//! every open upstream socket at once, which is what gives clients
//! O(seconds) failover without any client-side retargeting.

use crate::state::GatewayState;
use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::{debug, info, warn};

pub async fn upgrade(
    State(state): State<GatewayState>,
    OriginalUri(uri): OriginalUri,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(leader_addr) = state.current_leader().http_addr() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    let upstream_url = format!("ws://{leader_addr}{}", uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"));
    ws.on_upgrade(move |socket| pump(socket, state, upstream_url))
}

async fn pump(client_socket: WebSocket, state: GatewayState, upstream_url: String) {
    let (upstream, _response) = match tokio_tungstenite::connect_async(&upstream_url).await {
        Ok(pair) => pair,
        Err(err) => {
            warn!(%err, %upstream_url, "failed to dial upstream websocket");
            return;
        }
    };

    let (session_id, cancel) = state.register_upstream_session();
    info!(session_id, %upstream_url, "upstream websocket session opened");

    let (mut client_tx, mut client_rx) = client_socket.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(session_id, "cancelled by leader change, closing session");
                let _ = client_tx.send(AxumMessage::Close(None)).await;
                break;
            }
            inbound = client_rx.next() => {
                match inbound {
                    Some(Ok(frame)) => {
                        if upstream_tx.send(to_upstream(frame)).await.is_err() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
            outbound = upstream_rx.next() => {
                match outbound {
                    Some(Ok(frame)) => {
                        if let Some(frame) = to_client(frame) {
                            if client_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    _ => break,
                }
            }
        }
    }

    state.deregister_upstream_session(session_id);
    info!(session_id, "upstream websocket session closed");
}

fn to_upstream(frame: AxumMessage) -> UpstreamMessage {
    match frame {
        AxumMessage::Text(text) => UpstreamMessage::Text(text),
        AxumMessage::Binary(data) => UpstreamMessage::Binary(data),
        AxumMessage::Ping(data) => UpstreamMessage::Ping(data),
        AxumMessage::Pong(data) => UpstreamMessage::Pong(data),
        AxumMessage::Close(_) => UpstreamMessage::Close(None),
    }
}

fn to_client(frame: UpstreamMessage) -> Option<AxumMessage> {
    match frame {
        UpstreamMessage::Text(text) => Some(AxumMessage::Text(text)),
        UpstreamMessage::Binary(data) => Some(AxumMessage::Binary(data)),
        UpstreamMessage::Ping(data) => Some(AxumMessage::Ping(data)),
        UpstreamMessage::Pong(data) => Some(AxumMessage::Pong(data)),
        UpstreamMessage::Close(_) => Some(AxumMessage::Close(None)),
        _ => None,
    }
}
