// [libs/infra/mesh-client/src/client.rs]
/*!
 * The gateway's only outbound dependency: a `reqwest::Client` plus the
 * small amount of bookkeeping needed to forward a request to whichever
 * peer currently holds the leader role and to probe a worker's health
 * endpoint during a rolling upgrade.
 */

use crate::errors::ClientError;
use reqwest::{Client, StatusCode};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::instrument;

#[derive(Clone)]
pub struct LeaderClient {
    http: Client,
}

impl LeaderClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client configuration is static and always valid"),
        }
    }

    /// The underlying client, for callers (the gateway's HTTP handler) that
    /// need to stream a request/response body rather than buffer it.
    pub fn inner(&self) -> &Client {
        &self.http
    }

    pub fn forward_url(leader_http_addr: SocketAddr, path_and_query: &str) -> String {
        format!("http://{leader_http_addr}{path_and_query}")
    }

    /// GET `/health` on a worker that is mid-upgrade, used by the upgrade
    /// coordinator to decide whether a restarted worker has rejoined
    /// cleanly before moving on to the next one.
    #[instrument(skip(self))]
    pub async fn health_check(&self, addr: SocketAddr, timeout: Duration) -> Result<bool, ClientError> {
        let url = format!("http://{addr}/health");
        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await;
        match response {
            Ok(resp) => Ok(resp.status() == StatusCode::OK),
            Err(_) => Ok(false),
        }
    }
}

impl Default for LeaderClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the `X-Forwarded-*` header set the gateway attaches to every
/// request it proxies to the leader, so the leader's handlers can log the
/// real client address instead of the gateway's own loopback connection.
pub fn forwarded_headers(client_addr: SocketAddr, original_host: &str) -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        client_addr.ip().to_string().parse().expect("ip string is valid header value"),
    );
    headers.insert("x-forwarded-proto", "http".parse().unwrap());
    if let Ok(value) = original_host.parse() {
        headers.insert("x-forwarded-host", value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_url_joins_address_and_path() {
        let addr: SocketAddr = "10.0.0.5:9090".parse().unwrap();
        assert_eq!(
            LeaderClient::forward_url(addr, "/api/tasks?status=pending"),
            "http://10.0.0.5:9090/api/tasks?status=pending"
        );
    }

    #[test]
    fn forwarded_headers_carries_client_ip() {
        let addr: SocketAddr = "192.168.1.10:51234".parse().unwrap();
        let headers = forwarded_headers(addr, "mesh.local");
        assert_eq!(headers.get("x-forwarded-for").unwrap(), "192.168.1.10");
        assert_eq!(headers.get("x-forwarded-host").unwrap(), "mesh.local");
    }
}
