// [apps/gateway/src/proxy.rs]
//! HTTP reverse proxy: forwards every non-WebSocket request to whichever
//! peer the gateway currently believes is the leader, streaming the body
//! both ways instead of buffering it. When no leader is known yet, clients
//! get a 503 they can safely retry.

use crate::state::GatewayState;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use fleetmesh_client::{forwarded_headers, LeaderClient};
use std::net::SocketAddr;
use tracing::warn;

const HOLDING_PAGE: &str = include_str!("../assets/holding_page.html");

pub async fn forward(
    State(state): State<GatewayState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    method: axum::http::Method,
    uri: Uri,
    body: Body,
) -> Response {
    let Some(leader_addr) = state.current_leader().http_addr() else {
        return unavailable(&headers);
    };

    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let url = LeaderClient::forward_url(leader_addr, path_and_query);
    let original_host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(%err, "failed to buffer inbound request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let Ok(reqwest_method) = reqwest::Method::from_bytes(method.as_str().as_bytes()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut outbound = state
        .client
        .inner()
        .request(reqwest_method, &url)
        .headers(to_reqwest_headers(&headers))
        .headers(forwarded_headers(client_addr, original_host))
        .body(body_bytes)
        .timeout(state.config.upstream_timeout());
    outbound = outbound.header(axum::http::header::HOST.as_str(), leader_addr.to_string());

    match outbound.send().await {
        Ok(upstream) => {
            let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response_headers = to_axum_headers(upstream.headers());
            response_headers.remove(axum::http::header::TRANSFER_ENCODING);
            let stream = upstream.bytes_stream();
            let mut response = Response::builder().status(status);
            if let Some(response_builder_headers) = response.headers_mut() {
                *response_builder_headers = response_headers;
            }
            response
                .body(Body::from_stream(stream))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(err) => {
            warn!(%err, %leader_addr, "leader unreachable while forwarding request");
            unavailable(&headers)
        }
    }
}

/// `reqwest` 0.11 and `axum` 0.7 pull in different major versions of the
/// `http` crate, so their `HeaderMap`/`HeaderName`/`HeaderValue` types are
/// distinct — every header has to be round-tripped through bytes.
fn to_reqwest_headers(headers: &HeaderMap) -> reqwest::header::HeaderMap {
    let mut out = reqwest::header::HeaderMap::new();
    for (name, value) in headers.iter() {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            out.append(name, value);
        }
    }
    out
}

fn to_axum_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
            axum::http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            out.append(name, value);
        }
    }
    out
}

fn unavailable(headers: &HeaderMap) -> Response {
    let wants_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    let mut response = if wants_html {
        Response::builder()
            .header(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")
            .body(Body::from(HOLDING_PAGE))
    } else {
        Response::builder()
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"error":"no leader is currently known, retry shortly"}"#))
    }
    .expect("static response body always builds");
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response.headers_mut().insert("retry-after", "2".parse().unwrap());
    response
}
