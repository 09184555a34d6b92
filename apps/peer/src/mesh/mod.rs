// [apps/peer/src/mesh/mod.rs]
//! The coordination plane: dedup/claim primitives, the per-entity gossip
//! and DHT engines, leader election, anti-entropy repair, discovery, the
//! per-connection handshake, and the optional upgrade coordinator. See
//! `dispatch::MeshEngines` for how an inbound envelope finds its way to one
//! of these.

pub mod anti_entropy;
pub mod claim;
pub mod dedup;
pub mod dht;
pub mod discovery;
pub mod dispatch;
pub mod election;
pub mod gossip;
pub mod handshake;
pub mod upgrade;
