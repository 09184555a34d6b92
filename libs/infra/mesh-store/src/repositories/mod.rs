// [libs/infra/mesh-store/src/repositories/mod.rs]
pub mod agent;
pub mod dht;
pub mod state;
pub mod task;

pub use agent::AgentRepository;
pub use dht::DhtRepository;
pub use state::StateRepository;
pub use task::TaskRepository;
