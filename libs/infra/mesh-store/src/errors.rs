// [libs/infra/mesh-store/src/errors.rs]
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    #[error("query rejected: {0}")]
    QueryError(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    MappingError(String),

    #[error("task {0} not found")]
    TaskNotFound(uuid::Uuid),

    #[error("agent {0} not found")]
    AgentNotFound(uuid::Uuid),

    #[error("compare-and-set rejected: task is no longer at lamport_ts {expected}")]
    StaleWrite { expected: i64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;
