//! HTTP client used by the gateway: forwards requests to the current
//! leader and probes worker health during a rolling upgrade.

pub mod client;
pub mod errors;

pub use client::{forwarded_headers, LeaderClient};
pub use errors::ClientError;
