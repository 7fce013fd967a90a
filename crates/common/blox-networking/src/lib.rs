//! # Blox Networking
//!
//! Instance replication between a server tree and client trees.
//!
//! ## Architecture
//!
//! ```text
//! server InstanceTree ──Replicator calls──▶ ServerReplicator ──bincode──▶ Outbox
//!                                                                           │
//! client InstanceTree ◀──apply──────────── ClientReplicator ◀──decode───────┘
//! ```
//!
//! Transport is left to the host: drain the outbox, ship the bytes, and feed
//! them to [`ClientReplicator::apply_all`] on the other side.

pub mod protocol;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "client")]
pub mod client;

mod error;

// Re-exports
pub use error::{NetworkError, NetworkResult};
pub use protocol::{ReplicationPacket, MAX_PACKET_SIZE, PROTOCOL_VERSION};

#[cfg(feature = "server")]
pub use server::{drain, Outbox, ServerReplicator};

#[cfg(feature = "client")]
pub use client::ClientReplicator;
