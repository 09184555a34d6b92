// [apps/peer/src/handlers/mod.rs]
//! HTTP adapters exposed on `Config::http_port`: health/status for the
//! gateway and operators, and the task/agent/DHT API that turns an
//! external request into a gossip origination.

pub mod http;
