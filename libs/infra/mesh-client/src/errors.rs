// [libs/infra/mesh-client/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("upstream unreachable: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("upstream returned {0}")]
    ServerRejection(String),

    #[error("no leader is currently known")]
    NoLeader,
}
