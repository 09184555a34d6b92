//! Embedded ACID persistence for the coordination plane: tasks, agents,
//! agent tombstones, DHT entries, and a flat key/value table for small
//! singleton state (the Lamport clock, node identity).

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::MeshStoreClient;
pub use errors::{Result, StoreError};
pub use repositories::{AgentRepository, DhtRepository, StateRepository, TaskRepository};
